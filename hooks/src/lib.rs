//! # Plugin event system
//!
//! Single dispatch point for the runtime's two categories of extension
//! points:
//!
//! - **Observational callbacks** (`on_tool_start`, `on_api_response`,
//!   `on_turn_end`, ...): fired to every plugin that declares the
//!   capability. Sequential, fail-soft — a raising callback is logged and
//!   dispatch continues. Telemetry must never break the agent loop.
//! - **Behavioral hooks** (`hook_user_input`, `hook_tool_call`,
//!   `hook_response`, ...): sequential pipelines where plugin N's output
//!   feeds plugin N+1. Fail-fast — a raising hook propagates immediately,
//!   because a partially applied hook chain could corrupt state.
//!
//! Plugins advertise what they implement via [`Plugin::capabilities`];
//! the [`EventRunner`] inspects this once at construction and caches a
//! per-event dispatch list, so per-call dispatch is a plain indexed walk.

pub mod outcome;
pub mod plugin;
pub mod runner;

pub use outcome::ResponseDecision;
pub use outcome::ResponseDirective;
pub use outcome::ToolCallAdjustment;
pub use outcome::ToolCallDecision;
pub use plugin::Capability;
pub use plugin::Plugin;
pub use plugin::ProvidedTool;
pub use plugin::ProvidedToolFn;
pub use runner::EventRunner;
pub use runner::HookError;
