//! The tool registry: the single execution surface for tool calls.
//!
//! Hides where a tool came from (builtin, plugin-provided, external
//! toolset) behind one `call` path that resolves aliases, enforces
//! access, injects runtime context, bounds externally backed calls with
//! a timeout, and converts every failure mode into an error result. A
//! model misusing a tool is told "here is the error" — the run never
//! crashes at this boundary.

use crate::tools::context::ToolContext;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::ToolResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::warn;

/// Provider-facing description of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema parameter description, already in wire shape.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

pub type SimpleToolFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<ToolResult>> + Send + Sync>;
pub type ContextToolFn = Arc<
    dyn Fn(Value, ToolContext) -> BoxFuture<'static, anyhow::Result<ToolResult>> + Send + Sync,
>;

/// Whether a handler wants the runtime context injected.
#[derive(Clone)]
pub enum ToolHandlerKind {
    Simple(SimpleToolFn),
    Contextual(ContextToolFn),
}

#[derive(Clone)]
pub struct ToolEntry {
    pub spec: ToolSpec,
    pub access: AccessLevel,
    pub handler: ToolHandlerKind,
    /// Set for tools that reach an external subsystem; the call is
    /// failed (not crashed) when the deadline passes.
    pub timeout: Option<Duration>,
}

impl ToolEntry {
    pub fn simple<F, Fut>(spec: ToolSpec, access: AccessLevel, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        Self {
            spec,
            access,
            handler: ToolHandlerKind::Simple(Arc::new(move |args| handler(args).boxed())),
            timeout: None,
        }
    }

    pub fn contextual<F, Fut>(spec: ToolSpec, access: AccessLevel, handler: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        Self {
            spec,
            access,
            handler: ToolHandlerKind::Contextual(Arc::new(move |args, ctx| {
                handler(args, ctx).boxed()
            })),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool `{0}` is already registered")]
    Duplicate(String),

    #[error("alias `{alias}` would shadow or dangle: {reason}")]
    BadAlias { alias: String, reason: String },
}

/// Registration-ordered tool table plus alias map. Immutable after
/// process setup except for alias additions.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolEntry>,
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; duplicate names are rejected unless `replace`.
    pub fn register(&mut self, entry: ToolEntry, replace: bool) -> Result<(), RegistryError> {
        let name = entry.spec.name.clone();
        if !replace && self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, entry);
        Ok(())
    }

    /// Register a plugin-provided tool (closed over its plugin's state,
    /// so it never needs context injection).
    pub fn register_provided(
        &mut self,
        tool: agentrun_hooks::ProvidedTool,
    ) -> Result<(), RegistryError> {
        let handler = tool.handler;
        let entry = ToolEntry {
            spec: ToolSpec {
                name: tool.name,
                description: tool.description,
                parameters: serde_json::to_value(&tool.parameters)
                    .unwrap_or_else(|_| json!({"type": "object", "properties": {}})),
            },
            access: tool.access,
            handler: ToolHandlerKind::Simple(Arc::new(move |args| {
                let fut = handler(args);
                async move { Ok(fut.await) }.boxed()
            })),
            timeout: None,
        };
        self.register(entry, false)
    }

    /// Register an externally supplied `(name, handler, schema)` tuple
    /// (an out-of-process tool server). External calls are always
    /// time-bounded.
    pub fn register_external(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: SimpleToolFn,
        timeout: Duration,
    ) -> Result<(), RegistryError> {
        let entry = ToolEntry {
            spec: ToolSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            access: AccessLevel::Write,
            handler: ToolHandlerKind::Simple(handler),
            timeout: Some(timeout),
        };
        self.register(entry, false)
    }

    /// Map an additional name onto an existing tool.
    pub fn alias(
        &mut self,
        alias: impl Into<String>,
        canonical: &str,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        if self.tools.contains_key(&alias) {
            return Err(RegistryError::BadAlias {
                alias,
                reason: "a tool with that name exists".to_string(),
            });
        }
        if !self.tools.contains_key(canonical) {
            return Err(RegistryError::BadAlias {
                alias,
                reason: format!("no tool named `{canonical}`"),
            });
        }
        self.aliases.insert(alias, canonical.to_string());
        Ok(())
    }

    /// Canonical name for a possibly aliased one.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(self.resolve(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// `(name, description)` pairs for the list_tools builtin.
    pub fn catalog(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(name, entry)| (name.clone(), entry.spec.description.clone()))
            .collect()
    }

    /// Wire-ready specs for every tool callable at the given access
    /// level. Tools above the ceiling are not advertised.
    pub fn specs_for_wire(&self, access: AccessLevel) -> Vec<Value> {
        self.tools
            .values()
            .filter(|entry| access.allows(entry.access))
            .map(|entry| entry.spec.to_wire())
            .collect()
    }

    pub fn log_loaded(&self, model: &str) {
        info!(
            "[{model}] loaded {} tools: [{}]",
            self.tools.len(),
            self.names().join(", ")
        );
    }

    /// Execute a tool call. Never returns `Err`: unknown names, access
    /// violations, handler failures, panics and timeouts all come back
    /// as error results.
    pub async fn call(&self, name: &str, arguments: Value, ctx: ToolContext) -> ToolResult {
        let canonical = self.resolve(name);
        let Some(entry) = self.tools.get(canonical) else {
            return ToolResult::error(format!(
                "Unknown tool `{name}`. Use list_tools to enumerate the available tools."
            ));
        };

        if !ctx.access.allows(entry.access) {
            return ToolResult::error(format!(
                "Tool `{canonical}` requires {} access, but this process is limited to {}.",
                entry.access, ctx.access,
            ));
        }

        let fut = match &entry.handler {
            ToolHandlerKind::Simple(f) => f(arguments),
            ToolHandlerKind::Contextual(f) => f(arguments, ctx),
        };

        // Panics inside handlers are contained the same way errors are.
        let guarded = std::panic::AssertUnwindSafe(fut).catch_unwind();

        let outcome = match entry.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(tool = canonical, timeout_ms = limit.as_millis() as u64, "tool call timed out");
                    return ToolResult::error(format!(
                        "Tool `{canonical}` timed out after {} ms.",
                        limit.as_millis()
                    ));
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::error(format!("Tool `{canonical}` failed: {e}")),
            Err(_panic) => {
                warn!(tool = canonical, "tool handler panicked");
                ToolResult::error(format!("Tool `{canonical}` failed: handler panicked"))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}
