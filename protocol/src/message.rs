//! Conversation messages and content blocks.
//!
//! A [`Message`] is an ordered list of [`ContentBlock`]s under a single
//! [`Role`]. The block set mirrors what provider APIs exchange: text,
//! tool-use requests emitted by the model, tool results sent back, and
//! opaque thinking blocks some providers surface.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One content block within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        arguments: Value,
    },

    /// The outcome of a tool invocation, correlated by `call_id`.
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },

    /// Reasoning content surfaced by some providers. Carried opaquely;
    /// wire adapters decide whether it is ever re-sent.
    Thinking { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text of this block, if it is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// A tool-role message carrying one result block per completed call.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Tool, blocks)
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks in emission order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|b| b.is_tool_use())
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }

    /// Whether the message carries no renderable content at all.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
            || self
                .content
                .iter()
                .all(|b| matches!(b, ContentBlock::Text { text } if text.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn message_text_joins_text_blocks() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("hello "),
                ContentBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "calc".to_string(),
                    arguments: serde_json::json!({"expression": "2+2"}),
                },
                ContentBlock::text("world"),
            ],
        );
        assert_eq!(msg.text(), "hello world");
        assert!(msg.has_tool_use());
        assert_eq!(msg.tool_uses().count(), 1);
    }

    #[test]
    fn empty_detection() {
        assert!(Message::new(Role::Assistant, vec![]).is_empty());
        assert!(Message::assistant("").is_empty());
        assert!(!Message::assistant("x").is_empty());
    }

    #[test]
    fn content_block_round_trip() {
        let block = ContentBlock::ToolUse {
            id: "call_1".to_string(),
            name: "read_fd".to_string(),
            arguments: serde_json::json!({"fd": "fd:1", "start": 2}),
        };
        let json = serde_json::to_string(&block).expect("serialize");
        assert!(json.contains("\"type\":\"tool_use\""));
        let back: ContentBlock = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, block);
    }
}
