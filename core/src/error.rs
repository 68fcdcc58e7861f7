//! Core error taxonomy.
//!
//! Only genuinely exceptional conditions surface as `Err`: behavioral
//! hook failures (programming errors in extensions) and invalid
//! configuration or state transitions. Tool failures become error
//! results inside the conversation, and provider API errors terminate a
//! run cleanly with `stop_reason = error`, so neither appears here.

use agentrun_hooks::HookError;

#[derive(Debug, thiserror::Error)]
pub enum CoreErr {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid conversation state: {0}")]
    State(String),

    #[error("process error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreErr>;
