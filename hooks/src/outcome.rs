//! Reducer outcomes for behavioral hooks.

use agentrun_protocol::ToolResult;
use serde_json::Value;

/// One plugin's verdict on a pending tool call.
///
/// `name`/`arguments` rewrite the call for subsequent plugins and for
/// execution; `skip` substitutes a result and short-circuits the rest of
/// the chain — once one plugin skips, later plugins are not consulted.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAdjustment {
    pub name: Option<String>,
    pub arguments: Option<Value>,
    pub skip: Option<ToolResult>,
}

impl ToolCallAdjustment {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn rewrite_arguments(arguments: Value) -> Self {
        Self {
            arguments: Some(arguments),
            ..Default::default()
        }
    }

    /// Skip execution entirely, substituting the given result.
    pub fn skip_with(result: ToolResult) -> Self {
        Self {
            skip: Some(result),
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// The folded outcome of the `tool_call` hook chain.
#[derive(Debug, Clone)]
pub struct ToolCallDecision {
    pub name: String,
    pub arguments: Value,
    /// When set, the call is not executed and this result stands in.
    pub skip: Option<ToolResult>,
}

/// One plugin's verdict on the model's final text.
#[derive(Debug, Clone, Copy)]
pub struct ResponseDirective {
    /// Ask the turn loop to stop after this response.
    pub stop: bool,
    /// Whether the just-produced content should be kept in conversation
    /// state. Only meaningful together with `stop`.
    pub commit_current: bool,
}

impl ResponseDirective {
    pub fn stop() -> Self {
        Self {
            stop: true,
            commit_current: true,
        }
    }

    pub fn stop_and_discard() -> Self {
        Self {
            stop: true,
            commit_current: false,
        }
    }
}

/// The folded outcome of the `response` hook chain. The first plugin
/// requesting a stop ends the chain; plugins after it are not invoked.
#[derive(Debug, Clone, Copy)]
pub struct ResponseDecision {
    pub stop: bool,
    pub commit_current: bool,
}

impl Default for ResponseDecision {
    fn default() -> Self {
        Self {
            stop: false,
            commit_current: true,
        }
    }
}
