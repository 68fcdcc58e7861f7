//! Runtime context injected into tools that ask for it.

use crate::fd::FdManager;
use crate::state::SharedConversation;
use agentrun_protocol::AccessLevel;
use std::sync::Arc;
use uuid::Uuid;

/// Handed to contextual tool handlers alongside their arguments.
///
/// Carries the shared mutable dependencies a tool may act on: the
/// conversation state (goto truncates it), the descriptor store, and
/// the effective access level of the calling process.
#[derive(Clone)]
pub struct ToolContext {
    pub process_id: Uuid,
    pub access: AccessLevel,
    pub fd_manager: Arc<FdManager>,
    pub state: SharedConversation,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("process_id", &self.process_id)
            .field("access", &self.access)
            .finish()
    }
}
