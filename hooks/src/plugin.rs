//! The plugin contract.

use crate::outcome::ResponseDirective;
use crate::outcome::ToolCallAdjustment;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::Message;
use agentrun_protocol::RunResult;
use agentrun_protocol::ToolResult;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Named extension points a plugin can implement.
///
/// Behavioral hooks can transform or abort control flow; observational
/// callbacks are telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    // Behavioral hooks
    UserInputHook,
    ToolCallHook,
    ToolResultHook,
    SystemPromptHook,
    ResponseHook,
    ProvideTools,

    // Observational callbacks
    ToolStart,
    ToolEnd,
    ApiRequest,
    ApiResponse,
    ApiStreamBlock,
    TurnStart,
    TurnEnd,
    RunEnd,
}

impl Capability {
    pub fn is_behavioral(&self) -> bool {
        matches!(
            self,
            Self::UserInputHook
                | Self::ToolCallHook
                | Self::ToolResultHook
                | Self::SystemPromptHook
                | Self::ResponseHook
                | Self::ProvideTools
        )
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::UserInputHook => "user_input",
            Self::ToolCallHook => "tool_call",
            Self::ToolResultHook => "tool_result",
            Self::SystemPromptHook => "system_prompt",
            Self::ResponseHook => "response",
            Self::ProvideTools => "provide_tools",
            Self::ToolStart => "tool_start",
            Self::ToolEnd => "tool_end",
            Self::ApiRequest => "api_request",
            Self::ApiResponse => "api_response",
            Self::ApiStreamBlock => "api_stream_block",
            Self::TurnStart => "turn_start",
            Self::TurnEnd => "turn_end",
            Self::RunEnd => "run_end",
        }
    }
}

/// Handler for a plugin-provided tool. Takes the call arguments and
/// produces a result; tool failures are expressed as error results, not
/// `Err`.
pub type ProvidedToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// A tool contributed by a plugin at setup time.
///
/// The handler closes over whatever plugin state it needs, so provided
/// tools do not participate in registry context injection.
#[derive(Clone)]
pub struct ProvidedTool {
    pub name: String,
    pub description: String,
    pub parameters: JsonSchema,
    pub access: AccessLevel,
    pub handler: ProvidedToolFn,
}

impl std::fmt::Debug for ProvidedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidedTool")
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}

/// A stateful extension object.
///
/// Implement the subset of event methods matching the capabilities you
/// declare; undeclared methods are never invoked, and the default bodies
/// are no-ops. All methods take `&self` — plugins that need mutable state
/// use interior mutability, since the runner holds them behind `Arc`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name used in logs and hook error reports.
    fn name(&self) -> &str;

    /// The events this plugin wants to receive. Inspected once at
    /// [`crate::EventRunner`] construction; changing the returned set
    /// afterwards has no effect.
    fn capabilities(&self) -> &'static [Capability];

    /// Produce an independent copy for a forked conversation branch.
    ///
    /// Plugins whose state is shareable (or stateless) may return a clone
    /// of their own handle; plugins with per-conversation state must deep
    /// copy it.
    fn fork(&self) -> Arc<dyn Plugin>;

    /// Downcast support for [`crate::EventRunner::get_plugin`].
    fn as_any(&self) -> &dyn Any;

    /// Release long-lived resources at process shutdown. Called once,
    /// under a deadline: a hung close is abandoned, not awaited forever.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    // === Behavioral hooks (fail-fast) ===

    /// Replace the user input, or return `None` to pass it through.
    async fn hook_user_input(&self, _text: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Rewrite or skip a pending tool call. `None` passes it through.
    async fn hook_tool_call(
        &self,
        _tool_name: &str,
        _arguments: &Value,
    ) -> Result<Option<ToolCallAdjustment>> {
        Ok(None)
    }

    /// Replace a tool result, or return `None` to pass it through.
    async fn hook_tool_result(
        &self,
        _tool_name: &str,
        _result: &ToolResult,
    ) -> Result<Option<ToolResult>> {
        Ok(None)
    }

    /// Replace the system prompt, or return `None` to pass it through.
    /// Applied once per process at startup.
    async fn hook_system_prompt(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Inspect the model's final text and optionally direct the loop to
    /// stop and/or discard the just-produced content.
    async fn hook_response(&self, _text: &str) -> Result<Option<ResponseDirective>> {
        Ok(None)
    }

    /// Tools this plugin contributes. Asked once at setup time.
    fn provide_tools(&self) -> Vec<ProvidedTool> {
        Vec::new()
    }

    // === Observational callbacks (fail-soft) ===

    async fn on_tool_start(&self, _tool_name: &str, _arguments: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_tool_end(&self, _tool_name: &str, _result: &ToolResult) -> Result<()> {
        Ok(())
    }

    async fn on_api_request(&self, _request: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_api_response(&self, _response: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_api_stream_block(&self, _block: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_turn_start(&self, _turn_index: usize) -> Result<()> {
        Ok(())
    }

    async fn on_turn_end(&self, _turn_index: usize, _response: &Message) -> Result<()> {
        Ok(())
    }

    async fn on_run_end(&self, _run: &RunResult) -> Result<()> {
        Ok(())
    }
}
