//! The per-turn execution loop.
//!
//! One [`Executor::run`] call drives: append user input → call the model
//! → interpret content blocks → dispatch tool calls through the hook
//! pipeline → continue, stop or branch. Provider families share this
//! control flow; they differ only in wire shaping (owned by the client)
//! and in continuation bookkeeping (response-id markers vs. full-history
//! replay).

use crate::config::ProcessConfig;
use crate::error::CoreErr;
use crate::executor::flow::StopCheck;
use crate::executor::flow::TurnFlow;
use crate::fd::FdManager;
use crate::fd::FdPlugin;
use crate::process::RegistryBlueprint;
use crate::state::SharedConversation;
use crate::tools::builtins::ForkArgs;
use crate::tools::builtins::FORK_TOOL;
use crate::tools::ToolContext;
use crate::tools::ToolRegistry;
use agentrun_api::ApiRequest;
use agentrun_api::FailureDump;
use agentrun_api::ModelClient;
use agentrun_api::ModelResponse;
use agentrun_hooks::EventRunner;
use agentrun_protocol::ApiCallRecord;
use agentrun_protocol::ContentBlock;
use agentrun_protocol::Message;
use agentrun_protocol::Role;
use agentrun_protocol::RunResult;
use agentrun_protocol::StopReason;
use agentrun_protocol::ToolCallRecord;
use agentrun_protocol::ToolResult;
use futures::future::join_all;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

pub struct Executor {
    pub(crate) client: Arc<dyn ModelClient>,
    pub(crate) config: Arc<ProcessConfig>,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) blueprint: Arc<RegistryBlueprint>,
    pub(crate) events: Arc<EventRunner>,
    pub(crate) state: SharedConversation,
    pub(crate) fd_manager: Arc<FdManager>,
    pub(crate) system_prompt: String,
    pub(crate) stop_checks: Vec<Arc<dyn StopCheck>>,
    pub(crate) process_id: Uuid,
    pub(crate) is_branch: bool,
}

impl Executor {
    /// Drive one run to completion.
    ///
    /// `prompt` is `None` for a tool-continuation, where the triggering
    /// input is already embedded in conversation state as a prior tool
    /// result.
    pub async fn run(&self, prompt: Option<String>) -> Result<RunResult, CoreErr> {
        let mut run = RunResult::new();

        if let Some(prompt) = prompt {
            let text = self.events.user_input(prompt).await?;
            self.with_state(|state| state.push_message(Message::user(text)));
        }

        let mut iteration = 0;
        let stop_reason = loop {
            if iteration >= self.config.max_iterations {
                if self.config.final_summary_on_max {
                    self.final_summary(&mut run).await;
                }
                break StopReason::MaxIterations;
            }
            if let Some(reason) = self.poll_stop_checks(&run) {
                info!(reason = %reason, "stop check tripped");
                break reason;
            }

            self.events.turn_start(iteration).await;

            let request = self.build_request()?;
            let request_value = serde_json::to_value(&request).unwrap_or_default();
            self.events.api_request(&request_value).await;

            let started = Instant::now();
            let response = match self.client.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(provider = self.client.provider(), error = %e, "provider call failed");
                    let dump = FailureDump::new(
                        self.client.provider(),
                        request_value,
                        Some(Value::String(e.to_string())),
                    );
                    run.failure = serde_json::to_value(&dump).ok();
                    break StopReason::Error;
                }
            };
            run.add_api_call(ApiCallRecord {
                model: self.config.model.clone(),
                usage: response.usage,
                response_id: response.response_id.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
            self.events
                .api_response(&serde_json::to_value(&response).unwrap_or_default())
                .await;

            let assistant = Message::new(Role::Assistant, response.content.clone());

            if !response.has_tool_use() {
                // Terminal path: commit, consult the response hook, stop.
                let committed = if assistant.is_empty() {
                    false
                } else {
                    self.with_state(|state| state.push_message(assistant.clone()));
                    true
                };
                self.record_marker(&response);

                let decision = self.events.response(&response.text()).await?;
                self.events.turn_end(iteration, &assistant).await;
                if decision.stop {
                    if !decision.commit_current && committed {
                        self.with_state(|state| {
                            state.pop_message();
                        });
                    }
                    break StopReason::HookStop;
                }
                break StopReason::EndTurn;
            }

            // Tool path: the assistant message (text + tool_use blocks)
            // must be committed before results reference its call ids.
            self.with_state(|state| state.push_message(assistant.clone()));
            self.record_marker(&response);

            let flow = self.dispatch_tools(&response, &mut run).await?;
            self.events.turn_end(iteration, &assistant).await;
            match flow {
                TurnFlow::Continue => iteration += 1,
                TurnFlow::Stop(reason) => break reason,
            }
        };

        run.complete(stop_reason);
        info!(
            stop_reason = %stop_reason,
            api_calls = run.api_call_count(),
            tool_calls = run.tool_call_count(),
            "run complete"
        );
        self.events.run_end(&run).await;
        Ok(run)
    }

    /// Boxed entry point used for branch recursion: a branch's loop is
    /// the same loop, so the future type must be erased to tie the knot.
    fn run_boxed(
        &self,
        prompt: Option<String>,
    ) -> BoxFuture<'_, Result<RunResult, CoreErr>> {
        Box::pin(self.run(prompt))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut crate::state::ConversationState) -> T) -> T {
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn poll_stop_checks(&self, run: &RunResult) -> Option<StopReason> {
        self.stop_checks.iter().find_map(|check| check.check(run))
    }

    fn record_marker(&self, response: &ModelResponse) {
        if self.config.provider.uses_response_ids() {
            if let Some(id) = &response.response_id {
                self.with_state(|state| state.push_marker(id.clone()));
            }
        }
    }

    fn build_request(&self) -> Result<ApiRequest, CoreErr> {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        if !state.ready_for_model() {
            return Err(CoreErr::State(
                "conversation has unanswered tool calls or an empty trailing assistant turn"
                    .to_string(),
            ));
        }
        let (messages, previous) = if self.config.provider.uses_response_ids() {
            (
                state.messages_since_last_marker(),
                state.last_response_id().map(str::to_string),
            )
        } else {
            (state.messages().cloned().collect(), None)
        };
        drop(state);

        let mut request = ApiRequest::new(self.config.model.clone(), messages)
            .with_tools(self.registry.specs_for_wire(self.config.access))
            .with_params(self.config.params.clone());
        if !self.system_prompt.is_empty() {
            request = request.with_system(self.system_prompt.clone());
        }
        request.previous_response_id = previous;
        Ok(request)
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            process_id: self.process_id,
            access: self.config.access,
            fd_manager: Arc::clone(&self.fd_manager),
            state: Arc::clone(&self.state),
        }
    }

    /// Dispatch every tool-use block in emission order, appending the
    /// results as one tool message keyed by call id.
    async fn dispatch_tools(
        &self,
        response: &ModelResponse,
        run: &mut RunResult,
    ) -> Result<TurnFlow, CoreErr> {
        let calls: Vec<(String, String, Value)> = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse {
                    id,
                    name,
                    arguments,
                } => Some((id.clone(), name.clone(), arguments.clone())),
                _ => None,
            })
            .collect();

        let generation_before = self.with_state(|state| state.generation());
        let mut result_blocks: Vec<ContentBlock> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut abort = false;

        for (call_id, name, arguments) in calls {
            let decision = self.events.tool_call(name, arguments).await?;

            let forked = decision.skip.is_none()
                && self.registry.resolve(&decision.name) == FORK_TOOL
                && !self.is_branch;

            let result = if let Some(substitute) = decision.skip {
                debug!(tool = %decision.name, "tool call skipped by hook");
                substitute
            } else if forked {
                // Siblings without results must not reach the wire once
                // the branches start from a copy of this state.
                self.with_state(|state| state.strip_pending_tool_uses(&call_id, &completed));
                self.run_fork(&call_id, &decision.arguments).await
            } else {
                self.events
                    .tool_start(&decision.name, &decision.arguments)
                    .await;
                let raw = self
                    .registry
                    .call(&decision.name, decision.arguments.clone(), self.tool_context())
                    .await;
                let hooked = self.events.tool_result(&decision.name, raw).await?;
                self.events.tool_end(&decision.name, &hooked).await;
                hooked
            };

            run.add_tool_call(ToolCallRecord {
                name: decision.name,
                arguments: decision.arguments,
                is_error: result.is_error,
            });
            result_blocks.push(ContentBlock::ToolResult {
                call_id: call_id.clone(),
                content: result.text(),
                is_error: result.is_error,
            });
            completed.insert(call_id);

            if result.abort_execution {
                abort = true;
                break;
            }
            if forked {
                // Remaining sibling blocks were stripped from state.
                break;
            }
        }

        // A reset tool may have rewritten history out from under this
        // turn; results would orphan against a vanished assistant
        // message.
        let intact = self.with_state(|state| state.generation()) == generation_before;
        if intact && !result_blocks.is_empty() {
            self.with_state(|state| state.push_message(Message::tool_results(result_blocks)));
        }

        if abort {
            return Ok(TurnFlow::Stop(StopReason::ToolAbort));
        }
        Ok(TurnFlow::Continue)
    }

    /// Run the branching tool: one concurrent, state-isolated turn loop
    /// per sub-prompt, aggregated into a single result.
    async fn run_fork(&self, call_id: &str, arguments: &Value) -> ToolResult {
        let args: ForkArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => return ToolResult::error(format!("invalid fork arguments: {e}")),
        };
        if args.prompts.is_empty() {
            return ToolResult::error("fork requires at least one prompt");
        }

        let total = args.prompts.len();
        info!(branches = total, "forking conversation");

        let mut branches = Vec::new();
        for (i, prompt) in args.prompts.into_iter().enumerate() {
            // Each branch gets an independent copy of state (with the
            // fork call answered), of the plugin set, and of the
            // reference-class descriptors.
            let mut branch_state = self.with_state(|state| state.snapshot());
            branch_state.push_message(Message::tool_results(vec![ContentBlock::ToolResult {
                call_id: call_id.to_string(),
                content: format!("Forked: you are branch {i} of {total}."),
                is_error: false,
            }]));

            let branch_events = Arc::new(self.events.fork());
            let branch_fd = branch_events
                .get_plugin::<FdPlugin>()
                .map(FdPlugin::manager)
                .unwrap_or_else(|| Arc::new(FdManager::new(self.config.fd)));
            let branch_registry = match self.blueprint.build(&branch_events) {
                Ok(registry) => Arc::new(registry),
                Err(e) => return ToolResult::error(format!("cannot build branch registry: {e}")),
            };

            let branch = Executor {
                client: Arc::clone(&self.client),
                config: Arc::clone(&self.config),
                registry: branch_registry,
                blueprint: Arc::clone(&self.blueprint),
                events: branch_events,
                state: crate::state::shared(branch_state),
                fd_manager: branch_fd,
                system_prompt: self.system_prompt.clone(),
                stop_checks: self.stop_checks.clone(),
                process_id: Uuid::new_v4(),
                is_branch: true,
            };
            branches.push((i, prompt, branch));
        }

        let outcomes = join_all(branches.into_iter().map(|(i, prompt, branch)| async move {
            let outcome = branch.run_boxed(Some(prompt)).await;
            let text = match outcome {
                Ok(_) => branch
                    .with_state(|state| state.last_assistant_text())
                    .unwrap_or_else(|| "(branch produced no response)".to_string()),
                Err(e) => format!("(branch failed: {e})"),
            };
            (i, text)
        }))
        .await;

        let aggregated = outcomes
            .into_iter()
            .map(|(i, text)| format!("[branch {i}]\n{text}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        ToolResult::ok(aggregated)
    }

    /// One last tool-less call asking the model to wrap up, so a capped
    /// run does not end on a response that still wants tools.
    async fn final_summary(&self, run: &mut RunResult) {
        self.with_state(|state| {
            state.push_message(Message::user(
                "Maximum iterations reached. Please summarize what you have done so far \
                 and finish without further tool calls.",
            ))
        });

        let mut request = match self.build_request() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "skipping final summary");
                return;
            }
        };
        request.tools = Vec::new();

        let started = Instant::now();
        match self.client.complete(request).await {
            Ok(response) => {
                run.add_api_call(ApiCallRecord {
                    model: self.config.model.clone(),
                    usage: response.usage,
                    response_id: response.response_id.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                let message = Message::new(Role::Assistant, response.content.clone());
                if !message.is_empty() {
                    self.with_state(|state| state.push_message(message));
                }
                self.record_marker(&response);
            }
            Err(e) => warn!(error = %e, "final summary call failed"),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("process_id", &self.process_id)
            .field("model", &self.config.model)
            .field("is_branch", &self.is_branch)
            .finish()
    }
}
