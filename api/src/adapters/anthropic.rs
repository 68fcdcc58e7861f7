//! Anthropic messages-family wire shaping.
//!
//! Conversation messages become the `messages` array: assistant turns
//! carry `text` and `tool_use` blocks, tool results ride in user-role
//! messages as `tool_result` blocks correlated by `tool_use_id`. The
//! trailing message gets an ephemeral `cache_control` hint so repeated
//! turns reuse the provider-side prompt cache.

use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::response::ApiStopReason;
use crate::response::ModelResponse;
use agentrun_protocol::ContentBlock;
use agentrun_protocol::Role;
use agentrun_protocol::TokenUsage;
use serde_json::json;
use serde_json::Value;

/// Build the provider request body.
pub fn build_request_body(request: &ApiRequest) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    let mut current_assistant: Vec<Value> = Vec::new();

    for message in &request.messages {
        match message.role {
            Role::Assistant => {
                current_assistant.extend(message.content.iter().filter_map(block_to_param));
            }
            Role::System => {
                // System content rides in the top-level `system` field;
                // a stray system message mid-conversation is folded into
                // a user message to keep the wire shape valid.
                flush_assistant(&mut messages, &mut current_assistant);
                messages.push(json!({
                    "role": "user",
                    "content": [{"type": "text", "text": message.text()}],
                }));
            }
            Role::User | Role::Tool => {
                flush_assistant(&mut messages, &mut current_assistant);
                let blocks: Vec<Value> =
                    message.content.iter().filter_map(block_to_param).collect();
                if !blocks.is_empty() {
                    messages.push(json!({"role": "user", "content": blocks}));
                }
            }
        }
    }
    flush_assistant(&mut messages, &mut current_assistant);

    // Cache hint on the trailing message: everything up to here is a
    // stable prefix on the next call.
    if let Some(last) = messages.last_mut() {
        if let Some(blocks) = last.get_mut("content").and_then(Value::as_array_mut) {
            if let Some(block) = blocks.last_mut() {
                block["cache_control"] = json!({"type": "ephemeral"});
            }
        }
    }

    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(system) = &request.system {
        body["system"] = json!(system);
    }
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.clone());
    }
    if let Some(max_tokens) = request.params.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.params.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(top_p) = request.params.top_p {
        body["top_p"] = json!(top_p);
    }
    for (key, value) in &request.params.extra {
        body[key] = value.clone();
    }
    body
}

fn flush_assistant(messages: &mut Vec<Value>, current: &mut Vec<Value>) {
    if !current.is_empty() {
        messages.push(json!({"role": "assistant", "content": std::mem::take(current)}));
    }
}

fn block_to_param(block: &ContentBlock) -> Option<Value> {
    match block {
        ContentBlock::Text { text } => {
            if text.is_empty() {
                None
            } else {
                Some(json!({"type": "text", "text": text}))
            }
        }
        ContentBlock::ToolUse {
            id,
            name,
            arguments,
        } => Some(json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": arguments,
        })),
        ContentBlock::ToolResult {
            call_id,
            content,
            is_error,
        } => {
            let mut param = json!({
                "type": "tool_result",
                "tool_use_id": call_id,
                "content": content,
            });
            if *is_error {
                param["is_error"] = json!(true);
            }
            Some(param)
        }
        // Thinking blocks are not replayed.
        ContentBlock::Thinking { .. } => None,
    }
}

/// Parse a provider response body into the neutral envelope.
pub fn parse_response_body(body: &Value) -> Result<ModelResponse, ApiError> {
    let content_items = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid_response("missing `content` array"))?;

    let mut content = Vec::new();
    for item in content_items {
        match item.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = item
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::invalid_response("text block without `text`"))?;
                content.push(ContentBlock::text(text));
            }
            Some("tool_use") => {
                let id = item
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::invalid_response("tool_use block without `id`"))?;
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::invalid_response("tool_use block without `name`"))?;
                content.push(ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: item.get("input").cloned().unwrap_or(Value::Null),
                });
            }
            Some("thinking") => {
                let text = item
                    .get("thinking")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                content.push(ContentBlock::Thinking {
                    text: text.to_string(),
                });
            }
            _ => {}
        }
    }

    let stop_reason = match body.get("stop_reason").and_then(Value::as_str) {
        Some("end_turn") | None => ApiStopReason::EndTurn,
        Some("tool_use") => ApiStopReason::ToolUse,
        Some("max_tokens") => ApiStopReason::MaxTokens,
        Some(other) => ApiStopReason::Other(other.to_string()),
    };

    Ok(ModelResponse {
        content,
        stop_reason,
        usage: parse_usage(body.get("usage")),
        response_id: body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_usage(usage: Option<&Value>) -> TokenUsage {
    let get = |key: &str| {
        usage
            .and_then(|u| u.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    TokenUsage {
        input_tokens: get("input_tokens"),
        output_tokens: get("output_tokens"),
        cache_read_tokens: get("cache_read_input_tokens"),
        cache_write_tokens: get("cache_creation_input_tokens"),
    }
}

/// Convert neutral tool schemas (`{"name", "description", "parameters"}`)
/// into the provider's `input_schema` shape.
pub fn tools_to_wire(tools: &[Value]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name")?.as_str()?;
            Some(json!({
                "name": name,
                "description": tool.get("description").and_then(Value::as_str).unwrap_or(""),
                "input_schema": tool.get("parameters").cloned().unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_protocol::Message;
    use pretty_assertions::assert_eq;

    fn sample_request() -> ApiRequest {
        let assistant = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("let me check"),
                ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "calc".to_string(),
                    arguments: json!({"expression": "2+2"}),
                },
            ],
        );
        let results = Message::tool_results(vec![ContentBlock::ToolResult {
            call_id: "call_1".to_string(),
            content: "4".to_string(),
            is_error: false,
        }]);
        ApiRequest::new(
            "claude-test",
            vec![Message::user("what is 2+2?"), assistant, results],
        )
        .with_system("be brief")
    }

    #[test]
    fn request_body_groups_blocks_by_role() {
        let body = build_request_body(&sample_request());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "call_1");
        assert_eq!(body["system"], "be brief");
    }

    #[test]
    fn trailing_message_carries_cache_hint() {
        let body = build_request_body(&sample_request());
        let messages = body["messages"].as_array().unwrap();
        let last_blocks = messages[2]["content"].as_array().unwrap();
        assert_eq!(
            last_blocks.last().unwrap()["cache_control"],
            json!({"type": "ephemeral"})
        );
        // Earlier messages carry no hint.
        assert!(messages[0]["content"][0].get("cache_control").is_none());
    }

    #[test]
    fn response_parsing_extracts_blocks_and_usage() {
        let body = json!({
            "id": "msg_123",
            "content": [
                {"type": "text", "text": "I'll compute that."},
                {"type": "tool_use", "id": "call_9", "name": "calc", "input": {"expression": "3*3"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 100}
        });
        let response = parse_response_body(&body).unwrap();
        assert_eq!(response.stop_reason, ApiStopReason::ToolUse);
        assert_eq!(response.content.len(), 2);
        assert!(response.has_tool_use());
        assert_eq!(response.usage.cache_read_tokens, 100);
        assert_eq!(response.response_id.as_deref(), Some("msg_123"));
    }

    #[test]
    fn missing_content_is_invalid() {
        let err = parse_response_body(&json!({"stop_reason": "end_turn"})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }

    #[test]
    fn tool_schemas_use_input_schema() {
        let wire = tools_to_wire(&[json!({
            "name": "calc",
            "description": "Evaluate arithmetic",
            "parameters": {"type": "object", "properties": {}}
        })]);
        assert_eq!(wire[0]["name"], "calc");
        assert!(wire[0].get("input_schema").is_some());
        assert!(wire[0].get("parameters").is_none());
    }
}
