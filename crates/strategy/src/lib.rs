pub mod breaker;
pub mod covered_call;
pub mod exits;
pub mod gap_spread;
pub mod indicators;
pub mod momentum;
pub mod put_writer;
pub mod screener;

#[cfg(test)]
mod test_support;

pub use breaker::{
    AccountRiskState, BreakerPeriod, DailyBreaker, DailyCheck, PeriodBreaker, StrategyRiskState,
};
pub use covered_call::CoveredCallWriter;
pub use exits::{check_exit, ExitReason, ExitRules};
pub use gap_spread::{DatedFlag, GapSpreadWriter, GapTracker};
pub use indicators::PriceWindow;
pub use momentum::MomentumGenerator;
pub use put_writer::PutWriter;
pub use screener::IvScreener;
