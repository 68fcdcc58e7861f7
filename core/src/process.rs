//! Program → process composition.
//!
//! Turns a static configuration into a fully wired executor: plugin set,
//! tool registry (builtins + plugin-provided + external), enriched
//! system prompt and stop checks. The builder is the only place tools
//! are assembled, and it keeps the recipe (the blueprint) so a forked
//! branch can rebuild an isolated registry against its own plugin
//! copies.

use crate::config::ProcessConfig;
use crate::error::CoreErr;
use crate::error::Result;
use crate::executor::CostLimitCheck;
use crate::executor::Executor;
use crate::executor::StopCheck;
use crate::fd::FdPlugin;
use crate::state::shared;
use crate::state::ConversationState;
use crate::tools::builtins;
use crate::tools::SimpleToolFn;
use crate::tools::ToolRegistry;
use agentrun_api::ModelClient;
use agentrun_hooks::EventRunner;
use agentrun_hooks::Plugin;
use agentrun_protocol::RunResult;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// An externally supplied tool: a `(name, handler, schema)` tuple from
/// an out-of-process tool server.
#[derive(Clone)]
pub struct ExternalTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub handler: SimpleToolFn,
}

/// The registry recipe: everything needed to assemble a tool registry
/// for this process or for a forked branch (whose plugin-provided tools
/// must close over the branch's own plugin state).
pub struct RegistryBlueprint {
    pub(crate) config: Arc<ProcessConfig>,
    pub(crate) external: Vec<ExternalTool>,
    pub(crate) aliases: Vec<(String, String)>,
}

impl RegistryBlueprint {
    pub(crate) fn build(&self, events: &EventRunner) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        let reject = |e: crate::tools::RegistryError| CoreErr::Config(e.to_string());

        registry.register(builtins::calc_tool(), false).map_err(reject)?;
        registry
            .register(builtins::read_file_tool(), false)
            .map_err(reject)?;
        registry.register(builtins::fork_tool(), false).map_err(reject)?;
        registry.register(builtins::goto_tool(), false).map_err(reject)?;

        for tool in events.provide_tools() {
            registry.register_provided(tool).map_err(reject)?;
        }

        let timeout = Duration::from_millis(self.config.external_tool_timeout_ms);
        for tool in &self.external {
            registry
                .register_external(
                    tool.name.clone(),
                    tool.description.clone(),
                    tool.parameters.clone(),
                    Arc::clone(&tool.handler),
                    timeout,
                )
                .map_err(reject)?;
        }

        // list_tools closes over the final catalog, so it goes last.
        let catalog = registry.catalog();
        registry
            .register(builtins::list_tools_tool(catalog), false)
            .map_err(reject)?;

        for (alias, canonical) in &self.aliases {
            registry.alias(alias.clone(), canonical).map_err(reject)?;
        }

        Ok(registry)
    }
}

/// Builder for [`AgentProcess`].
pub struct ProcessBuilder {
    config: ProcessConfig,
    client: Arc<dyn ModelClient>,
    plugins: Vec<Arc<dyn Plugin>>,
    external: Vec<ExternalTool>,
    aliases: Vec<(String, String)>,
    stop_checks: Vec<Arc<dyn StopCheck>>,
}

impl ProcessBuilder {
    pub fn new(config: ProcessConfig, client: Arc<dyn ModelClient>) -> Self {
        Self {
            config,
            client,
            plugins: Vec::new(),
            external: Vec::new(),
            aliases: Vec::new(),
            stop_checks: Vec::new(),
        }
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_external_tool(mut self, tool: ExternalTool) -> Self {
        self.external.push(tool);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), canonical.into()));
        self
    }

    pub fn with_stop_check(mut self, check: Arc<dyn StopCheck>) -> Self {
        self.stop_checks.push(check);
        self
    }

    pub async fn build(self) -> Result<AgentProcess> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        // The descriptor plugin is appended after user plugins so the
        // oversized-output check sees the final transformed result.
        let mut plugins = self.plugins;
        plugins.push(Arc::new(FdPlugin::new(config.fd)));
        let events = Arc::new(EventRunner::new(plugins));

        let fd_manager = events
            .get_plugin::<FdPlugin>()
            .map(FdPlugin::manager)
            .ok_or_else(|| CoreErr::Internal("descriptor plugin missing".to_string()))?;

        let blueprint = Arc::new(RegistryBlueprint {
            config: Arc::clone(&config),
            external: self.external,
            aliases: self.aliases,
        });
        let registry = Arc::new(blueprint.build(&events)?);
        registry.log_loaded(&config.model);

        // The system prompt pipeline runs once, at startup.
        let system_prompt = events.system_prompt(config.system_prompt.clone()).await?;

        let mut stop_checks = self.stop_checks;
        if let Some(cost) = &config.cost {
            if let Some(limit) = cost.limit_usd {
                stop_checks.push(Arc::new(CostLimitCheck::new(cost.rates, limit)));
            }
        }

        let executor = Executor {
            client: self.client,
            config,
            registry,
            blueprint,
            events,
            state: shared(ConversationState::new()),
            fd_manager,
            system_prompt,
            stop_checks,
            process_id: Uuid::new_v4(),
            is_branch: false,
        };

        Ok(AgentProcess { executor })
    }
}

/// A fully wired agent process.
pub struct AgentProcess {
    executor: Executor,
}

impl AgentProcess {
    pub fn builder(config: ProcessConfig, client: Arc<dyn ModelClient>) -> ProcessBuilder {
        ProcessBuilder::new(config, client)
    }

    /// Run one user prompt to completion.
    pub async fn run(&self, prompt: impl Into<String>) -> Result<RunResult> {
        self.executor.run(Some(prompt.into())).await
    }

    /// Continue after an externally injected tool result, without a new
    /// user turn.
    pub async fn run_continuation(&self) -> Result<RunResult> {
        self.executor.run(None).await
    }

    pub fn process_id(&self) -> Uuid {
        self.executor.process_id
    }

    /// First registered plugin of a concrete type.
    pub fn get_plugin<T: 'static>(&self) -> Option<&T> {
        self.executor.events.get_plugin::<T>()
    }

    /// An independent copy of this process: snapshotted conversation,
    /// forked plugins (reference-class descriptors only) and a registry
    /// rebuilt against the copies. Nothing mutable is shared afterwards.
    pub fn fork(&self) -> Result<AgentProcess> {
        let events = Arc::new(self.executor.events.fork());
        let fd_manager = events
            .get_plugin::<FdPlugin>()
            .map(FdPlugin::manager)
            .ok_or_else(|| CoreErr::Internal("descriptor plugin missing".to_string()))?;
        let registry = Arc::new(self.executor.blueprint.build(&events)?);

        Ok(AgentProcess {
            executor: Executor {
                client: Arc::clone(&self.executor.client),
                config: Arc::clone(&self.executor.config),
                registry,
                blueprint: Arc::clone(&self.executor.blueprint),
                events,
                state: shared(self.conversation()),
                fd_manager,
                system_prompt: self.executor.system_prompt.clone(),
                stop_checks: self.executor.stop_checks.clone(),
                process_id: Uuid::new_v4(),
                is_branch: false,
            },
        })
    }

    /// Snapshot of the current conversation state.
    #[allow(clippy::unwrap_used)]
    pub fn conversation(&self) -> ConversationState {
        self.executor.state.lock().unwrap().clone()
    }

    /// Time-bounded cleanup: plugins get one `close` call each, and a
    /// hung close is abandoned at the configured deadline rather than
    /// blocking shutdown forever.
    pub async fn shutdown(self) {
        let deadline = Duration::from_millis(self.executor.config.shutdown_timeout_ms);
        let events = Arc::clone(&self.executor.events);
        if tokio::time::timeout(deadline, events.close_all())
            .await
            .is_err()
        {
            warn!(timeout_ms = deadline.as_millis() as u64, "shutdown deadline hit; abandoning cleanup");
        }
    }
}

impl std::fmt::Debug for AgentProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProcess")
            .field("process_id", &self.executor.process_id)
            .field("model", &self.executor.config.model)
            .finish()
    }
}
