//! Opening-gap triggered credit spreads.
//!
//! Compares today's first open with the prior day's last close for a volatility index
//! and an equity underlying, and writes a short-dated vertical on a separate chain when
//! both gaps line up.

use chrono::NaiveDate;
use regime_engine_core::{
    Bar, GapSpreadConfig, IntentDirection, IntentSize, IntentTarget, LiquidityConfig, OptionRight,
    RegimeState, SignalGenerator, StrategyKind, Tick, TickContext, TradeIntent,
};
use regime_engine_options::{build_vertical_spread, SpreadRequest};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

/// Prior-day close and current-day open for one instrument.
#[derive(Debug, Clone, Default)]
pub struct GapTracker {
    previous_close: Option<f64>,
    last_close: Option<(NaiveDate, f64)>,
    today_open: Option<(NaiveDate, f64)>,
}

impl GapTracker {
    pub fn observe(&mut self, date: NaiveDate, bar: &Bar) {
        let (Some(open), Some(close)) = (bar.open.to_f64(), bar.close.to_f64()) else {
            return;
        };
        match self.last_close {
            Some((day, _)) if date < day => return,
            Some((day, prior)) if date > day => {
                self.previous_close = Some(prior);
                self.today_open = Some((date, open));
            }
            None => self.today_open = Some((date, open)),
            Some(_) => {}
        }
        self.last_close = Some((date, close));
    }

    /// `(open - previous_close) / previous_close` for `date`, once both are known.
    #[must_use]
    pub fn gap(&self, date: NaiveDate) -> Option<f64> {
        let (day, open) = self.today_open?;
        let previous = self.previous_close?;
        (day == date && previous > 0.0).then(|| (open - previous) / previous)
    }
}

/// Remembers the calendar date on which something last happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatedFlag {
    date: Option<NaiveDate>,
}

impl DatedFlag {
    #[must_use]
    pub fn is_set_on(&self, date: NaiveDate) -> bool {
        self.date == Some(date)
    }

    pub fn set(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }
}

pub struct GapSpreadWriter {
    volatility_symbol: String,
    underlying_symbol: String,
    chain_symbol: String,
    config: GapSpreadConfig,
    liquidity: LiquidityConfig,
    volatility: GapTracker,
    underlying: GapTracker,
    traded: DatedFlag,
}

impl GapSpreadWriter {
    #[must_use]
    pub fn new(
        volatility_symbol: &str,
        underlying_symbol: &str,
        chain_symbol: &str,
        config: GapSpreadConfig,
        liquidity: LiquidityConfig,
    ) -> Self {
        Self {
            volatility_symbol: volatility_symbol.to_string(),
            underlying_symbol: underlying_symbol.to_string(),
            chain_symbol: chain_symbol.to_string(),
            config,
            liquidity,
            volatility: GapTracker::default(),
            underlying: GapTracker::default(),
            traded: DatedFlag::default(),
        }
    }

    fn direction(&self, volatility_gap: f64, underlying_gap: f64) -> Option<OptionRight> {
        let c = &self.config;
        if volatility_gap >= c.vix_threshold && underlying_gap >= c.underlying_threshold {
            Some(OptionRight::Call)
        } else if volatility_gap <= -c.vix_threshold && underlying_gap <= c.put_underlying_ceiling {
            Some(OptionRight::Put)
        } else {
            None
        }
    }
}

impl SignalGenerator for GapSpreadWriter {
    /// Feeds both trackers on every tick, halted or not.
    fn observe(&mut self, tick: &Tick) {
        let today = tick.date();
        if let Some(bar) = tick.bar(&self.volatility_symbol) {
            self.volatility.observe(today, bar);
        }
        if let Some(bar) = tick.bar(&self.underlying_symbol) {
            self.underlying.observe(today, bar);
        }
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent> {
        let today = ctx.tick.date();
        if ctx.verdict.is_halted() || self.traded.is_set_on(today) {
            return vec![];
        }
        match ctx.regime {
            Some(RegimeState::Neutral | RegimeState::Bear) => {}
            Some(RegimeState::Bull) | None => return vec![],
        }

        let (Some(volatility_gap), Some(underlying_gap)) =
            (self.volatility.gap(today), self.underlying.gap(today))
        else {
            return vec![];
        };
        let Some(right) = self.direction(volatility_gap, underlying_gap) else {
            return vec![];
        };
        let Some(chain) = ctx.tick.chain(&self.chain_symbol) else {
            debug!(chain = %self.chain_symbol, "Gap triggered but no chain on this tick");
            return vec![];
        };

        let sign = match right {
            OptionRight::Call => 1.0,
            OptionRight::Put => -1.0,
        };
        let request = SpreadRequest {
            right,
            short_delta: sign * self.config.short_delta,
            long_delta: sign * self.config.long_delta,
            dte_max: self.config.dte_max,
            quantity: self.config.quantity,
        };

        match build_vertical_spread(chain, &request, &self.liquidity, today) {
            Ok(order) => {
                info!(
                    right = %right,
                    volatility_gap,
                    underlying_gap,
                    short = %order.short_leg.contract.display_name(),
                    long = %order.long_leg.contract.display_name(),
                    limit = %order.limit_price,
                    "Gap spread triggered"
                );
                self.traded.set(today);
                let tag = match right {
                    OptionRight::Call => "GapCallSpread",
                    OptionRight::Put => "GapPutSpread",
                };
                let quantity = order.quantity;
                vec![TradeIntent::new(
                    StrategyKind::GapSpread,
                    IntentTarget::Spread(order),
                    IntentDirection::Sell,
                    IntentSize::Contracts(quantity),
                )
                .with_horizon(u32::try_from(self.config.dte_max.max(1)).unwrap_or(1))
                .with_tag(tag)]
            }
            Err(e) => {
                warn!(error = %e, right = %right, "Gap spread not built, will retry");
                vec![]
            }
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::GapSpread
    }
}
