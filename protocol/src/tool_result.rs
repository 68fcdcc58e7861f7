//! Tool execution result envelope.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Content carried by a [`ToolResult`]: plain text or a structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Structured(Value),
}

impl ToolResultContent {
    /// Render the content as the string fed back to the model.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Outcome of one tool invocation.
///
/// Tool failures are data, not control flow: a handler error becomes an
/// error result fed back into the conversation, never an exception past
/// the registry boundary. `abort_execution` asks the executor to end the
/// turn loop immediately after this result is recorded; the goto tool
/// sets it because the history it just truncated must not be extended by
/// the same turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: ToolResultContent,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub abort_execution: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: ToolResultContent::Text(content.into()),
            is_error: false,
            abort_execution: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: ToolResultContent::Text(message.into()),
            is_error: true,
            abort_execution: false,
        }
    }

    /// Wrap a plain structured value as a success result.
    pub fn from_value(value: Value) -> Self {
        Self {
            content: ToolResultContent::Structured(value),
            is_error: false,
            abort_execution: false,
        }
    }

    /// Mark this result as aborting the turn loop.
    pub fn abort(mut self) -> Self {
        self.abort_execution = true;
        self
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }
}
