//! # agentrun core
//!
//! The runtime proper: the per-turn execution loop, the tool registry,
//! the file-descriptor engine and the process composition layer that
//! wires a validated configuration, a provider client and a plugin set
//! into a runnable agent process.
//!
//! The control-flow contract is shared by every provider family: build
//! the request from conversation state, call the model, interpret the
//! content blocks, dispatch tool calls through the hook pipeline, and
//! decide whether to continue, stop or branch. Families differ only in
//! wire shaping and in whether conversation continuation happens by
//! replaying history or by server-side response identifiers.

pub mod config;
pub mod error;
pub mod executor;
pub mod fd;
pub mod logging;
pub mod process;
pub mod state;
pub mod sync;
pub mod tools;

pub use config::ProcessConfig;
pub use config::ProviderKind;
pub use error::CoreErr;
pub use error::Result;
pub use executor::CostLimitCheck;
pub use executor::Executor;
pub use executor::StopCheck;
pub use fd::FdConfig;
pub use fd::FdManager;
pub use fd::FdPlugin;
pub use process::AgentProcess;
pub use process::ProcessBuilder;
pub use state::ConversationState;
pub use state::SharedConversation;
pub use sync::SyncProcess;
pub use tools::ToolContext;
pub use tools::ToolRegistry;
