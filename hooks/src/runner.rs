//! The event runner: cached-capability dispatch over a plugin set.

use crate::outcome::ResponseDecision;
use crate::outcome::ToolCallDecision;
use crate::plugin::Capability;
use crate::plugin::Plugin;
use crate::plugin::ProvidedTool;
use agentrun_protocol::Message;
use agentrun_protocol::RunResult;
use agentrun_protocol::ToolResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A behavioral hook failed.
///
/// Hook errors propagate out of the turn loop unmodified: a hook is
/// expected to run at-most-once per event, and partial application could
/// corrupt state.
#[derive(Debug, thiserror::Error)]
#[error("plugin `{plugin}` failed in `{event}` hook: {source}")]
pub struct HookError {
    pub plugin: String,
    pub event: &'static str,
    #[source]
    pub source: anyhow::Error,
}

/// Dispatches events to a fixed set of plugins.
///
/// Capabilities are read once at construction and cached as per-event
/// index lists; registration order is dispatch order for every event.
pub struct EventRunner {
    plugins: Vec<Arc<dyn Plugin>>,
    dispatch: HashMap<Capability, Vec<usize>>,
}

impl EventRunner {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut dispatch: HashMap<Capability, Vec<usize>> = HashMap::new();
        for (index, plugin) in plugins.iter().enumerate() {
            for capability in plugin.capabilities() {
                dispatch.entry(*capability).or_default().push(index);
            }
        }
        Self { plugins, dispatch }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Find the first registered plugin of a concrete type.
    pub fn get_plugin<T: 'static>(&self) -> Option<&T> {
        self.plugins
            .iter()
            .find_map(|p| p.as_any().downcast_ref::<T>())
    }

    /// Independent copy of the runner for a forked conversation branch.
    /// Each plugin decides whether to deep-copy or share itself.
    pub fn fork(&self) -> Self {
        Self::new(self.plugins.iter().map(|p| p.fork()).collect())
    }

    fn subscribers(&self, capability: Capability) -> &[usize] {
        self.dispatch
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn hook_error(
        &self,
        index: usize,
        capability: Capability,
        source: anyhow::Error,
    ) -> HookError {
        HookError {
            plugin: self.plugins[index].name().to_string(),
            event: capability.event_name(),
            source,
        }
    }

    // === Behavioral hooks ===

    /// Run the `user_input` pipeline. Each plugin may replace the text;
    /// `None` passes the current value through.
    pub async fn user_input(&self, text: String) -> Result<String, HookError> {
        let mut current = text;
        for &i in self.subscribers(Capability::UserInputHook) {
            match self.plugins[i].hook_user_input(&current).await {
                Ok(Some(replacement)) => current = replacement,
                Ok(None) => {}
                Err(e) => return Err(self.hook_error(i, Capability::UserInputHook, e)),
            }
        }
        Ok(current)
    }

    /// Run the `system_prompt` pipeline (applied once per process at
    /// startup).
    pub async fn system_prompt(&self, prompt: String) -> Result<String, HookError> {
        let mut current = prompt;
        for &i in self.subscribers(Capability::SystemPromptHook) {
            match self.plugins[i].hook_system_prompt(&current).await {
                Ok(Some(replacement)) => current = replacement,
                Ok(None) => {}
                Err(e) => return Err(self.hook_error(i, Capability::SystemPromptHook, e)),
            }
        }
        Ok(current)
    }

    /// Run the `tool_call` pipeline. Name/argument rewrites fold forward;
    /// the first skip short-circuits the chain.
    pub async fn tool_call(
        &self,
        name: String,
        arguments: Value,
    ) -> Result<ToolCallDecision, HookError> {
        let mut decision = ToolCallDecision {
            name,
            arguments,
            skip: None,
        };
        for &i in self.subscribers(Capability::ToolCallHook) {
            let adjustment = self.plugins[i]
                .hook_tool_call(&decision.name, &decision.arguments)
                .await
                .map_err(|e| self.hook_error(i, Capability::ToolCallHook, e))?;
            let Some(adjustment) = adjustment else {
                continue;
            };
            if let Some(name) = adjustment.name {
                decision.name = name;
            }
            if let Some(arguments) = adjustment.arguments {
                decision.arguments = arguments;
            }
            if let Some(result) = adjustment.skip {
                decision.skip = Some(result);
                break;
            }
        }
        Ok(decision)
    }

    /// Run the `tool_result` pipeline, same replace-or-pass semantics as
    /// `user_input`.
    pub async fn tool_result(
        &self,
        tool_name: &str,
        result: ToolResult,
    ) -> Result<ToolResult, HookError> {
        let mut current = result;
        for &i in self.subscribers(Capability::ToolResultHook) {
            match self.plugins[i].hook_tool_result(tool_name, &current).await {
                Ok(Some(replacement)) => current = replacement,
                Ok(None) => {}
                Err(e) => return Err(self.hook_error(i, Capability::ToolResultHook, e)),
            }
        }
        Ok(current)
    }

    /// Run the `response` pipeline. The first plugin requesting a stop
    /// ends the chain.
    pub async fn response(&self, text: &str) -> Result<ResponseDecision, HookError> {
        let mut decision = ResponseDecision::default();
        for &i in self.subscribers(Capability::ResponseHook) {
            let directive = self.plugins[i]
                .hook_response(text)
                .await
                .map_err(|e| self.hook_error(i, Capability::ResponseHook, e))?;
            if let Some(directive) = directive {
                if directive.stop {
                    decision.stop = true;
                    decision.commit_current = directive.commit_current;
                    break;
                }
            }
        }
        Ok(decision)
    }

    /// Union of all plugin-provided tools, in registration order.
    pub fn provide_tools(&self) -> Vec<ProvidedTool> {
        let mut tools = Vec::new();
        for &i in self.subscribers(Capability::ProvideTools) {
            tools.extend(self.plugins[i].provide_tools());
        }
        tools
    }

    // === Observational callbacks ===

    pub async fn tool_start(&self, tool_name: &str, arguments: &Value) {
        for &i in self.subscribers(Capability::ToolStart) {
            if let Err(e) = self.plugins[i].on_tool_start(tool_name, arguments).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "tool_start callback failed");
            }
        }
    }

    pub async fn tool_end(&self, tool_name: &str, result: &ToolResult) {
        for &i in self.subscribers(Capability::ToolEnd) {
            if let Err(e) = self.plugins[i].on_tool_end(tool_name, result).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "tool_end callback failed");
            }
        }
    }

    pub async fn api_request(&self, request: &Value) {
        for &i in self.subscribers(Capability::ApiRequest) {
            if let Err(e) = self.plugins[i].on_api_request(request).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "api_request callback failed");
            }
        }
    }

    pub async fn api_response(&self, response: &Value) {
        for &i in self.subscribers(Capability::ApiResponse) {
            if let Err(e) = self.plugins[i].on_api_response(response).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "api_response callback failed");
            }
        }
    }

    pub async fn api_stream_block(&self, block: &Value) {
        for &i in self.subscribers(Capability::ApiStreamBlock) {
            if let Err(e) = self.plugins[i].on_api_stream_block(block).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "api_stream_block callback failed");
            }
        }
    }

    pub async fn turn_start(&self, turn_index: usize) {
        for &i in self.subscribers(Capability::TurnStart) {
            if let Err(e) = self.plugins[i].on_turn_start(turn_index).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "turn_start callback failed");
            }
        }
    }

    pub async fn turn_end(&self, turn_index: usize, response: &Message) {
        for &i in self.subscribers(Capability::TurnEnd) {
            if let Err(e) = self.plugins[i].on_turn_end(turn_index, response).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "turn_end callback failed");
            }
        }
    }

    pub async fn run_end(&self, run: &RunResult) {
        for &i in self.subscribers(Capability::RunEnd) {
            if let Err(e) = self.plugins[i].on_run_end(run).await {
                warn!(plugin = self.plugins[i].name(), error = %e, "run_end callback failed");
            }
        }
    }

    /// Close every plugin, fail-soft like a callback.
    pub async fn close_all(&self) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.close().await {
                warn!(plugin = plugin.name(), error = %e, "plugin close failed");
            }
        }
    }
}

impl std::fmt::Debug for EventRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRunner")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
