//! Loop control types.
//!
//! The loop outcome is a value threaded through the turn loop, not an
//! exception: each phase reports whether to keep going or why to stop.

use agentrun_protocol::CostRates;
use agentrun_protocol::RunResult;
use agentrun_protocol::StopReason;

/// Verdict of one dispatch phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnFlow {
    Continue,
    Stop(StopReason),
}

/// Polled at the top of every loop iteration; the first check returning
/// a reason terminates the run cleanly, preserving the accumulated
/// [`RunResult`].
pub trait StopCheck: Send + Sync {
    fn check(&self, run: &RunResult) -> Option<StopReason>;
}

/// Stops the run once derived cost crosses the configured ceiling.
#[derive(Debug, Clone, Copy)]
pub struct CostLimitCheck {
    rates: CostRates,
    limit_usd: f64,
}

impl CostLimitCheck {
    pub fn new(rates: CostRates, limit_usd: f64) -> Self {
        Self { rates, limit_usd }
    }
}

impl StopCheck for CostLimitCheck {
    fn check(&self, run: &RunResult) -> Option<StopReason> {
        if run.cost_usd(&self.rates) >= self.limit_usd {
            Some(StopReason::CostLimitExceeded)
        } else {
            None
        }
    }
}
