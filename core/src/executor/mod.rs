//! The turn-loop executor and its control types.

mod driver;
mod flow;

pub use driver::Executor;
pub use flow::CostLimitCheck;
pub use flow::StopCheck;
pub use flow::TurnFlow;
