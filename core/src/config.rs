//! Process configuration.
//!
//! The validated-configuration boundary: host applications hand the
//! runtime a [`ProcessConfig`], either built in code or loaded from
//! TOML. Everything upstream of this struct (schema validation, CLI
//! merging, credential resolution) is the host's concern.

use crate::error::CoreErr;
use crate::fd::FdConfig;
use agentrun_api::ApiParams;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::CostRates;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

/// Provider wire-protocol family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    OpenaiResponses,
}

impl ProviderKind {
    /// Whether conversation continuation uses server-side response
    /// identifiers instead of replaying full history.
    pub fn uses_response_ids(&self) -> bool {
        matches!(self, Self::OpenaiResponses)
    }
}

/// Cost accounting and the optional per-run spend ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostControl {
    pub rates: CostRates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub model: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Give the model one final tool-less call asking it to wrap up when
    /// the iteration cap is reached, instead of returning a response
    /// that still wants tools.
    #[serde(default)]
    pub final_summary_on_max: bool,
    #[serde(default = "default_access")]
    pub access: AccessLevel,
    #[serde(default)]
    pub fd: FdConfig,
    #[serde(default)]
    pub params: ApiParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostControl>,
    /// Timeout applied to tool calls that reach an external subsystem.
    #[serde(default = "default_tool_timeout_ms")]
    pub external_tool_timeout_ms: u64,
    /// Ceiling on process cleanup; a hung external resource must not
    /// block shutdown past this.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_max_iterations() -> usize {
    10
}

fn default_access() -> AccessLevel {
    AccessLevel::Write
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout_ms() -> u64 {
    2_000
}

impl ProcessConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: ProviderKind::default(),
            system_prompt: String::new(),
            max_iterations: default_max_iterations(),
            final_summary_on_max: false,
            access: default_access(),
            fd: FdConfig::default(),
            params: ApiParams::default(),
            cost: None,
            external_tool_timeout_ms: default_tool_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CoreErr> {
        let config: Self =
            toml::from_str(raw).map_err(|e| CoreErr::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CoreErr> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreErr::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CoreErr> {
        if self.model.is_empty() {
            return Err(CoreErr::Config("model must not be empty".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(CoreErr::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.fd
            .validate()
            .map_err(|e| CoreErr::Config(e.to_string()))?;
        if let Some(cost) = &self.cost {
            if let Some(limit) = cost.limit_usd {
                if limit <= 0.0 {
                    return Err(CoreErr::Config(
                        "cost.limit_usd must be positive".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_from_toml() {
        let config = ProcessConfig::from_toml_str(
            r#"
model = "claude-test"
system_prompt = "be brief"
max_iterations = 5

[fd]
page_size = 1000
max_direct_output_chars = 2000

[cost]
rates = { input_per_mtok = 3.0, output_per_mtok = 15.0 }
limit_usd = 1.5
"#,
        )
        .unwrap();
        assert_eq!(config.model, "claude-test");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.fd.page_size, 1000);
        assert_eq!(config.access, AccessLevel::Write);
        assert_eq!(config.cost.unwrap().limit_usd, Some(1.5));
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = ProcessConfig::from_toml_str("model = \"m\"\nmax_iterations = 0").unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn provider_continuation_mode() {
        assert!(!ProviderKind::Anthropic.uses_response_ids());
        assert!(ProviderKind::OpenaiResponses.uses_response_ids());
    }
}
