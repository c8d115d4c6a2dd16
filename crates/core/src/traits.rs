use crate::intent::{StrategyKind, TradeIntent};
use crate::market::Tick;
use crate::state::{BreakerVerdict, RegimeState};

/// Shared read-only view handed to every generator on a tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// `None` until the regime classifier has produced a first state.
    pub regime: Option<RegimeState>,
    pub verdict: BreakerVerdict,
    pub tick: &'a Tick,
}

/// A per-strategy signal generator. Called once per tick, in a fixed order.
///
/// Implementations own their private position state and must return an empty
/// vector when the tick carries nothing relevant to them.
pub trait SignalGenerator {
    /// Refreshes caches from the raw tick. Runs before breakers and regime gating.
    fn observe(&mut self, _tick: &Tick) {}

    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent>;
    fn kind(&self) -> StrategyKind;
}
