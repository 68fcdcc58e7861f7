//! Shared protocol types for the agentrun runtime.
//!
//! These are the data carriers exchanged between the executor, the tool
//! registry, the plugin system and the provider adapters. They are plain
//! serde values with no behavior beyond construction and inspection, so
//! every other crate in the workspace can depend on them without pulling
//! in runtime machinery.

pub mod access;
pub mod message;
pub mod run;
pub mod schema;
pub mod stop;
pub mod tool_result;
pub mod usage;

pub use access::AccessLevel;
pub use run::ApiCallRecord;
pub use run::CostRates;
pub use run::RunResult;
pub use run::ToolCallRecord;
pub use message::ContentBlock;
pub use message::Message;
pub use message::Role;
pub use schema::JsonSchema;
pub use stop::StopReason;
pub use tool_result::ToolResult;
pub use tool_result::ToolResultContent;
pub use usage::TokenUsage;
