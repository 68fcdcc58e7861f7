//! Conversation control tools: branching (`fork`) and time-travel
//! (`goto`).
//!
//! `goto` executes here: it rewrites the shared conversation state and
//! aborts the current turn loop via the result's abort flag. `fork` only
//! contributes its schema — the executor dispatches it specially, since
//! branching needs the whole loop machinery; a direct handler invocation
//! means a branch tried to fork again, which is forbidden.

use crate::tools::context::ToolContext;
use crate::tools::registry::ToolEntry;
use crate::tools::registry::ToolSpec;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::Message;
use agentrun_protocol::ToolResult;
use serde::Deserialize;
use serde_json::Value;

/// Tool name the executor intercepts for branching.
pub const FORK_TOOL: &str = "fork";
/// Tool name for conversation reset.
pub const GOTO_TOOL: &str = "goto";

#[derive(Debug, Deserialize)]
pub struct ForkArgs {
    /// One sub-prompt per requested branch.
    pub prompts: Vec<String>,
}

pub fn fork_tool() -> ToolEntry {
    let spec = ToolSpec {
        name: FORK_TOOL.to_string(),
        description: "Branch the conversation: run each prompt as an independent copy of \
                      the current conversation, concurrently, and return every branch's \
                      final response in one aggregated result."
            .to_string(),
        parameters: serde_json::to_value(JsonSchema::object(vec![(
            "prompts",
            JsonSchema::Array {
                description: Some("Sub-prompts, one per branch".to_string()),
                items: Box::new(JsonSchema::string("A branch prompt")),
            },
            true,
        )]))
        .unwrap_or_default(),
    };
    ToolEntry::simple(spec, AccessLevel::Write, |_args| async move {
        // Reachable only when the executor did not intercept, i.e. from
        // inside a branch.
        Ok(ToolResult::error(
            "fork is not available inside a forked branch",
        ))
    })
}

#[derive(Debug, Deserialize)]
struct GotoArgs {
    /// Message to return to, e.g. "msg_3"; that message is kept and
    /// everything after it is discarded.
    position: String,
    /// Optional summary appended as a user message after truncation.
    #[serde(default)]
    message: Option<String>,
}

pub fn goto_tool() -> ToolEntry {
    let spec = ToolSpec {
        name: GOTO_TOOL.to_string(),
        description: "Reset the conversation to an earlier point. Messages are numbered \
                      msg_0, msg_1, ... in order; everything after the given position is \
                      discarded and an optional summary message is appended. Ends the \
                      current turn."
            .to_string(),
        parameters: serde_json::to_value(JsonSchema::object(vec![
            (
                "position",
                JsonSchema::string("Message id to return to, e.g. msg_3"),
                true,
            ),
            (
                "message",
                JsonSchema::string("Summary of what was learned, appended after the reset"),
                false,
            ),
        ]))
        .unwrap_or_default(),
    };
    ToolEntry::contextual(spec, AccessLevel::Write, |args, ctx| async move {
        Ok(run_goto(args, &ctx))
    })
}

fn run_goto(args: Value, ctx: &ToolContext) -> ToolResult {
    let args: GotoArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return ToolResult::error(format!("invalid goto arguments: {e}")),
    };
    let Some(index) = parse_message_id(&args.position) else {
        return ToolResult::error(format!(
            "invalid position `{}`; expected a message id like msg_3",
            args.position
        ));
    };

    #[allow(clippy::unwrap_used)]
    let mut state = ctx.state.lock().unwrap();
    let total = state.message_count();
    if index + 1 >= total {
        return ToolResult::error(format!(
            "cannot reset to {}; only earlier messages are valid (msg_0..msg_{})",
            args.position,
            total.saturating_sub(2),
        ));
    }

    let removed = match state.truncate_to_message(index + 1) {
        Ok(removed) => removed,
        Err(e) => return ToolResult::error(e.to_string()),
    };
    if let Some(summary) = args.message {
        state.push_message(Message::user(summary));
    }

    ToolResult::ok(format!(
        "Conversation reset to {}; {removed} messages removed.",
        args.position
    ))
    .abort()
}

fn parse_message_id(position: &str) -> Option<usize> {
    position.strip_prefix("msg_")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::FdConfig;
    use crate::fd::FdManager;
    use crate::state::shared;
    use crate::state::ConversationState;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx_with_messages(texts: &[&str]) -> ToolContext {
        let mut state = ConversationState::new();
        for text in texts {
            state.push_message(Message::user(*text));
        }
        ToolContext {
            process_id: Uuid::new_v4(),
            access: AccessLevel::Write,
            fd_manager: Arc::new(FdManager::new(FdConfig::default())),
            state: shared(state),
        }
    }

    #[test]
    fn goto_truncates_and_aborts() {
        let ctx = ctx_with_messages(&["a", "b", "c", "d"]);
        let result = run_goto(
            serde_json::json!({"position": "msg_1", "message": "we learned X"}),
            &ctx,
        );
        assert!(!result.is_error);
        assert!(result.abort_execution);

        let state = ctx.state.lock().unwrap();
        assert_eq!(state.message_count(), 3); // a, b, summary
        let texts: Vec<String> = state.messages().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["a", "b", "we learned X"]);
    }

    #[test]
    fn goto_to_current_position_is_rejected() {
        let ctx = ctx_with_messages(&["a", "b"]);
        let result = run_goto(serde_json::json!({"position": "msg_1"}), &ctx);
        assert!(result.is_error);
        assert!(!result.abort_execution);
    }

    #[test]
    fn goto_rejects_bad_ids() {
        let ctx = ctx_with_messages(&["a", "b", "c"]);
        assert!(run_goto(serde_json::json!({"position": "3"}), &ctx).is_error);
        assert!(run_goto(serde_json::json!({"position": "msg_x"}), &ctx).is_error);
    }

    #[tokio::test]
    async fn direct_fork_invocation_is_refused() {
        let entry = fork_tool();
        let handler = match entry.handler {
            crate::tools::registry::ToolHandlerKind::Simple(f) => f,
            _ => unreachable!(),
        };
        let result = handler(serde_json::json!({"prompts": ["x"]})).await.unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("not available inside"));
    }
}
