//! Run accounting: per-run API and tool call records with derived totals.

use crate::stop::StopReason;
use crate::usage::TokenUsage;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One provider API call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub model: String,
    pub usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
}

/// One tool call dispatched during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub is_error: bool,
}

/// Per-million-token pricing used to derive run cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    #[serde(default)]
    pub cache_read_per_mtok: f64,
    #[serde(default)]
    pub cache_write_per_mtok: f64,
}

/// Aggregated outcome of one `run()` invocation.
///
/// Mutated by the executor while the run is in flight, then finalized
/// with [`RunResult::complete`] and handed back to the caller read-only.
/// Token and cost totals are derived from the API call records on demand
/// rather than tracked incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub api_calls: Vec<ApiCallRecord>,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Redacted request/response dump attached when the run stopped on a
    /// provider error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Value>,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            api_calls: Vec::new(),
            tool_calls: Vec::new(),
            stop_reason: None,
            started_at: Utc::now(),
            ended_at: None,
            failure: None,
        }
    }

    pub fn add_api_call(&mut self, record: ApiCallRecord) {
        self.api_calls.push(record);
    }

    pub fn add_tool_call(&mut self, record: ToolCallRecord) {
        self.tool_calls.push(record);
    }

    /// Stamp the end time and the final stop reason.
    pub fn complete(&mut self, stop_reason: StopReason) {
        self.stop_reason = Some(stop_reason);
        self.ended_at = Some(Utc::now());
    }

    pub fn api_call_count(&self) -> usize {
        self.api_calls.len()
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Sum of usage across all API calls.
    pub fn total_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for call in &self.api_calls {
            total.add(&call.usage);
        }
        total
    }

    /// Derived USD cost under the given rates.
    pub fn cost_usd(&self, rates: &CostRates) -> f64 {
        let usage = self.total_usage();
        let per_tok = |count: u64, per_mtok: f64| count as f64 * per_mtok / 1_000_000.0;
        per_tok(usage.input_tokens, rates.input_per_mtok)
            + per_tok(usage.output_tokens, rates.output_per_mtok)
            + per_tok(usage.cache_read_tokens, rates.cache_read_per_mtok)
            + per_tok(usage.cache_write_tokens, rates.cache_write_per_mtok)
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(input: u64, output: u64) -> ApiCallRecord {
        ApiCallRecord {
            model: "test-model".to_string(),
            usage: TokenUsage::new(input, output),
            response_id: None,
            duration_ms: 5,
        }
    }

    #[test]
    fn totals_are_derived_from_records() {
        let mut run = RunResult::new();
        run.add_api_call(call(100, 10));
        run.add_api_call(call(250, 40));
        assert_eq!(run.api_call_count(), 2);
        assert_eq!(run.total_usage(), TokenUsage::new(350, 50));
    }

    #[test]
    fn cost_uses_per_mtok_rates() {
        let mut run = RunResult::new();
        run.add_api_call(call(1_000_000, 500_000));
        let rates = CostRates {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
            ..Default::default()
        };
        assert!((run.cost_usd(&rates) - 10.5).abs() < 1e-9);
    }

    #[test]
    fn complete_stamps_end_and_reason() {
        let mut run = RunResult::new();
        assert!(run.duration().is_none());
        run.complete(StopReason::EndTurn);
        assert_eq!(run.stop_reason, Some(StopReason::EndTurn));
        assert!(run.duration().is_some());
    }
}
