//! Scripted mock provider for executor tests.
#![allow(dead_code)]

use agentrun_api::ApiError;
use agentrun_api::ApiRequest;
use agentrun_api::ApiStopReason;
use agentrun_api::ModelClient;
use agentrun_api::ModelResponse;
use agentrun_protocol::ContentBlock;
use agentrun_protocol::TokenUsage;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&ApiRequest) -> ModelResponse + Send + Sync>;

enum Script {
    /// Pop responses in order; error when exhausted.
    Queue(Mutex<VecDeque<ModelResponse>>),
    /// Clone the same response forever.
    Repeat(ModelResponse),
    /// Compute the response from the request.
    Dynamic(Responder),
}

pub struct MockClient {
    script: Script,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockClient {
    pub fn scripted(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(responses.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            script: Script::Repeat(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn dynamic(responder: impl Fn(&ApiRequest) -> ModelResponse + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Dynamic(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockClient {
    async fn complete(&self, request: ApiRequest) -> Result<ModelResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::classify(500, "mock script exhausted")),
            Script::Repeat(response) => Ok(response.clone()),
            Script::Dynamic(responder) => Ok(responder(&request)),
        }
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: ApiStopReason::EndTurn,
        usage: TokenUsage::new(10, 5),
        response_id: None,
    }
}

pub fn tool_use_response(calls: Vec<(&str, &str, Value)>) -> ModelResponse {
    ModelResponse {
        content: calls
            .into_iter()
            .map(|(id, name, arguments)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            })
            .collect(),
        stop_reason: ApiStopReason::ToolUse,
        usage: TokenUsage::new(10, 5),
        response_id: None,
    }
}

pub fn with_response_id(mut response: ModelResponse, id: &str) -> ModelResponse {
    response.response_id = Some(id.to_string());
    response
}

pub fn with_usage(mut response: ModelResponse, input: u64, output: u64) -> ModelResponse {
    response.usage = TokenUsage::new(input, output);
    response
}

/// Last user-visible text in the request, for dynamic responders.
pub fn last_text(request: &ApiRequest) -> String {
    request
        .messages
        .last()
        .map(|m| {
            m.content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}
