//! Conversation state: the ordered message sequence plus the bookkeeping
//! markers used by providers that continue conversations server-side.

use crate::error::CoreErr;
use agentrun_protocol::ContentBlock;
use agentrun_protocol::Message;
use agentrun_protocol::Role;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

/// One entry in the conversation log.
///
/// `ResponseMarker` records that everything before it is already held
/// server-side under the given response id; it never reaches the wire
/// and is excluded from token accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationEntry {
    Message(Message),
    ResponseMarker { response_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    entries: Vec<ConversationEntry>,
    /// Bumped on every truncation, so the executor can tell that a tool
    /// rewrote history out from under the turn in flight.
    #[serde(default)]
    generation: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, message: Message) {
        self.entries.push(ConversationEntry::Message(message));
    }

    pub fn push_marker(&mut self, response_id: impl Into<String>) {
        self.entries.push(ConversationEntry::ResponseMarker {
            response_id: response_id.into(),
        });
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    /// Messages only, markers filtered out.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|e| match e {
            ConversationEntry::Message(m) => Some(m),
            ConversationEntry::ResponseMarker { .. } => None,
        })
    }

    pub fn message_count(&self) -> usize {
        self.messages().count()
    }

    /// Identifier of the most recent marker, if any.
    pub fn last_response_id(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| match e {
            ConversationEntry::ResponseMarker { response_id } => Some(response_id.as_str()),
            ConversationEntry::Message(_) => None,
        })
    }

    /// Messages accumulated since the most recent marker — what a
    /// response-id provider needs on the next call.
    pub fn messages_since_last_marker(&self) -> Vec<Message> {
        let tail_start = self
            .entries
            .iter()
            .rposition(|e| matches!(e, ConversationEntry::ResponseMarker { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries[tail_start..]
            .iter()
            .filter_map(|e| match e {
                ConversationEntry::Message(m) => Some(m.clone()),
                ConversationEntry::ResponseMarker { .. } => None,
            })
            .collect()
    }

    /// Estimated context footprint in characters; markers are
    /// bookkeeping and do not count.
    pub fn estimated_context_chars(&self) -> usize {
        self.messages()
            .map(|m| {
                m.content
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.chars().count(),
                        ContentBlock::ToolUse { arguments, .. } => {
                            arguments.to_string().chars().count()
                        }
                        ContentBlock::ToolResult { content, .. } => content.chars().count(),
                        ContentBlock::Thinking { text } => text.chars().count(),
                    })
                    .sum::<usize>()
            })
            .sum()
    }

    /// Truncate to the first `keep` messages (goto/time-travel). Markers
    /// trailing the cut point are dropped with it.
    pub fn truncate_to_message(&mut self, keep: usize) -> Result<usize, CoreErr> {
        let total = self.message_count();
        if keep > total {
            return Err(CoreErr::State(format!(
                "cannot truncate to {keep} messages; only {total} exist"
            )));
        }
        let mut seen = 0;
        let mut cut = self.entries.len();
        for (i, entry) in self.entries.iter().enumerate() {
            if seen == keep {
                cut = i;
                break;
            }
            if matches!(entry, ConversationEntry::Message(_)) {
                seen += 1;
            }
        }
        let removed = self.message_count() - keep;
        self.entries.truncate(cut);
        self.generation += 1;
        Ok(removed)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// On the last assistant message, drop tool-use blocks that have no
    /// result yet, except `keep_call_id`. Used by the branching tool: a
    /// branch starts executing before its siblings have results, so the
    /// siblings must not reach the wire.
    pub fn strip_pending_tool_uses(&mut self, keep_call_id: &str, completed: &HashSet<String>) {
        let Some(last_assistant) = self.entries.iter_mut().rev().find_map(|e| match e {
            ConversationEntry::Message(m) if m.role == Role::Assistant => Some(m),
            _ => None,
        }) else {
            return;
        };
        last_assistant.content.retain(|block| match block {
            ContentBlock::ToolUse { id, .. } => id == keep_call_id || completed.contains(id),
            _ => true,
        });
    }

    /// Remove and return the most recent message, dropping any markers
    /// stacked on top of it.
    pub fn pop_message(&mut self) -> Option<Message> {
        while let Some(entry) = self.entries.last() {
            match entry {
                ConversationEntry::ResponseMarker { .. } => {
                    self.entries.pop();
                }
                ConversationEntry::Message(_) => {
                    return match self.entries.pop() {
                        Some(ConversationEntry::Message(m)) => Some(m),
                        _ => None,
                    };
                }
            }
        }
        None
    }

    /// Text of the most recent assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages()
            .filter(|m| m.role == Role::Assistant)
            .last()
            .map(Message::text)
    }

    /// Structurally independent copy for a forked branch.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Wire-validity invariant: the sequence must not end in an empty
    /// assistant turn, and every tool use in the last assistant message
    /// must have a matching result somewhere after it.
    pub fn ready_for_model(&self) -> bool {
        let messages: Vec<&Message> = self.messages().collect();
        let Some(last) = messages.last() else {
            return true;
        };
        if last.role == Role::Assistant && last.is_empty() {
            return false;
        }

        // Find the last assistant message and collect its call ids.
        let Some(assistant_pos) = messages.iter().rposition(|m| m.role == Role::Assistant)
        else {
            return true;
        };
        let pending: Vec<&str> = messages[assistant_pos]
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        if pending.is_empty() {
            return true;
        }
        let answered: HashSet<&str> = messages[assistant_pos + 1..]
            .iter()
            .flat_map(|m| &m.content)
            .filter_map(|b| match b {
                ContentBlock::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        pending.iter().all(|id| answered.contains(id))
    }
}

/// Shared handle to the state owned by a running process. Locked only
/// for short synchronous sections, never across an await point.
pub type SharedConversation = Arc<Mutex<ConversationState>>;

pub fn shared(state: ConversationState) -> SharedConversation {
    Arc::new(Mutex::new(state))
}
