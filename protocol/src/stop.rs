//! Run termination reasons.

use serde::Deserialize;
use serde::Serialize;

/// Why a turn loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model produced a final response with no tool use.
    EndTurn,
    /// The configured iteration cap was reached.
    MaxIterations,
    /// A provider API error aborted the run.
    Error,
    /// A response hook requested the loop stop.
    HookStop,
    /// A stop check (cost limit) tripped between iterations.
    CostLimitExceeded,
    /// A tool result carried the abort flag (history reset).
    ToolAbort,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EndTurn => "end_turn",
            Self::MaxIterations => "max_iterations",
            Self::Error => "error",
            Self::HookStop => "hook_stop",
            Self::CostLimitExceeded => "cost_limit_exceeded",
            Self::ToolAbort => "tool_abort",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_snake_case() {
        let json = serde_json::to_string(&StopReason::CostLimitExceeded).unwrap();
        assert_eq!(json, "\"cost_limit_exceeded\"");
        let back: StopReason = serde_json::from_str("\"tool_abort\"").unwrap();
        assert_eq!(back, StopReason::ToolAbort);
    }
}
