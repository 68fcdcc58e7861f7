//! Response envelope returned by a [`crate::ModelClient`].

use agentrun_protocol::ContentBlock;
use agentrun_protocol::TokenUsage;
use serde::Deserialize;
use serde::Serialize;

/// Provider-reported stop reason, normalized across protocol families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other(String),
}

/// One model response: ordered content blocks plus accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: ApiStopReason,
    pub usage: TokenUsage,
    /// Server-side identifier for providers that support conversation
    /// continuation by reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl ModelResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks in the order the model emitted them.
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content.iter().filter(|b| b.is_tool_use()).collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }
}
