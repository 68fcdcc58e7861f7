//! Responses-family wire shaping (server-side conversation continuation).
//!
//! This protocol family keeps conversation state on the provider side:
//! each response carries an opaque identifier, and the next request sends
//! `previous_response_id` plus only the input items produced since that
//! identifier, instead of replaying the whole history. The executor is
//! responsible for slicing the message list; this adapter shapes whatever
//! it is given.

use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::response::ApiStopReason;
use crate::response::ModelResponse;
use agentrun_protocol::ContentBlock;
use agentrun_protocol::Message;
use agentrun_protocol::Role;
use agentrun_protocol::TokenUsage;
use serde_json::json;
use serde_json::Value;

/// Build the provider request body.
pub fn build_request_body(request: &ApiRequest) -> Value {
    let input: Vec<Value> = request.messages.iter().flat_map(message_to_items).collect();

    let mut body = json!({
        "model": request.model,
        "input": input,
    });
    if let Some(system) = &request.system {
        body["instructions"] = json!(system);
    }
    if let Some(previous) = &request.previous_response_id {
        body["previous_response_id"] = json!(previous);
    }
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(tools_to_wire(&request.tools));
    }
    if let Some(max_tokens) = request.params.max_tokens {
        body["max_output_tokens"] = json!(max_tokens);
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

fn message_to_items(message: &Message) -> Vec<Value> {
    let mut items = Vec::new();
    match message.role {
        Role::Assistant => {
            for block in &message.content {
                match block {
                    ContentBlock::Text { text } if !text.is_empty() => {
                        items.push(json!({
                            "type": "message",
                            "role": "assistant",
                            "content": [{"type": "output_text", "text": text}],
                        }));
                    }
                    ContentBlock::ToolUse {
                        id,
                        name,
                        arguments,
                    } => {
                        items.push(json!({
                            "type": "function_call",
                            "call_id": id,
                            "name": name,
                            "arguments": arguments.to_string(),
                        }));
                    }
                    _ => {}
                }
            }
        }
        Role::Tool => {
            for block in &message.content {
                if let ContentBlock::ToolResult {
                    call_id, content, ..
                } = block
                {
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": call_id,
                        "output": content,
                    }));
                }
            }
        }
        Role::User | Role::System => {
            let text = message.text();
            if !text.is_empty() {
                items.push(json!({
                    "type": "message",
                    "role": "user",
                    "content": [{"type": "input_text", "text": text}],
                }));
            }
        }
    }
    items
}

/// Parse a provider response body into the neutral envelope.
pub fn parse_response_body(body: &Value) -> Result<ModelResponse, ApiError> {
    let output = body
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid_response("missing `output` array"))?;

    let mut content = Vec::new();
    for item in output {
        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                if let Some(parts) = item.get("content").and_then(Value::as_array) {
                    for part in parts {
                        if part.get("type").and_then(Value::as_str) == Some("output_text") {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                content.push(ContentBlock::text(text));
                            }
                        }
                    }
                }
            }
            Some("function_call") => {
                let call_id = item
                    .get("call_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ApiError::invalid_response("function_call without `call_id`")
                    })?;
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::invalid_response("function_call without `name`"))?;
                let arguments = item
                    .get("arguments")
                    .and_then(Value::as_str)
                    .map(|raw| {
                        serde_json::from_str(raw)
                            .unwrap_or_else(|_| json!({"raw": raw}))
                    })
                    .unwrap_or(Value::Null);
                content.push(ContentBlock::ToolUse {
                    id: call_id.to_string(),
                    name: name.to_string(),
                    arguments,
                });
            }
            Some("reasoning") => {
                let text = item
                    .get("summary")
                    .and_then(Value::as_array)
                    .and_then(|parts| parts.first())
                    .and_then(|part| part.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                content.push(ContentBlock::Thinking {
                    text: text.to_string(),
                });
            }
            _ => {}
        }
    }

    let has_tool_call = content.iter().any(ContentBlock::is_tool_use);
    let stop_reason = match body.get("status").and_then(Value::as_str) {
        Some("incomplete") => ApiStopReason::MaxTokens,
        Some("completed") | None => {
            if has_tool_call {
                ApiStopReason::ToolUse
            } else {
                ApiStopReason::EndTurn
            }
        }
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
        cache_read_tokens: usage
            .and_then(|u| u.pointer("/input_tokens_details/cached_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        cache_write_tokens: 0,
    }
}

/// Convert neutral tool schemas into the flat function shape this family
/// expects.
pub fn tools_to_wire(tools: &[Value]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name")?.as_str()?;
            Some(json!({
                "type": "function",
                "name": name,
                "description": tool.get("description").and_then(Value::as_str).unwrap_or(""),
                "parameters": tool.get("parameters").cloned().unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn continuation_id_is_forwarded() {
        let mut request = ApiRequest::new("gpt-test", vec![Message::user("continue")]);
        request.previous_response_id = Some("resp_42".to_string());
        let body = build_request_body(&request);
        assert_eq!(body["previous_response_id"], "resp_42");
        assert_eq!(body["input"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn tool_results_become_function_call_output() {
        let request = ApiRequest::new(
            "gpt-test",
            vec![Message::tool_results(vec![ContentBlock::ToolResult {
                call_id: "call_7".to_string(),
                content: "6".to_string(),
                is_error: false,
            }])],
        );
        let body = build_request_body(&request);
        let item = &body["input"][0];
        assert_eq!(item["type"], "function_call_output");
        assert_eq!(item["call_id"], "call_7");
        assert_eq!(item["output"], "6");
    }

    #[test]
    fn response_parsing_decodes_function_calls() {
        let body = json!({
            "id": "resp_99",
            "status": "completed",
            "output": [
                {"type": "function_call", "call_id": "call_1", "name": "calc",
                 "arguments": "{\"expression\": \"3+3\"}"}
            ],
            "usage": {"input_tokens": 7, "output_tokens": 3,
                      "input_tokens_details": {"cached_tokens": 4}}
        });
        let response = parse_response_body(&body).unwrap();
        assert_eq!(response.stop_reason, ApiStopReason::ToolUse);
        assert_eq!(response.response_id.as_deref(), Some("resp_99"));
        assert_eq!(response.usage.cache_read_tokens, 4);
        match &response.content[0] {
            ContentBlock::ToolUse { name, arguments, .. } => {
                assert_eq!(name, "calc");
                assert_eq!(arguments["expression"], "3+3");
            }
            other => panic!("expected tool use, got {other:?}"),
        }
    }
}
