use chrono::NaiveDate;
use regime_engine_core::{
    IntentDirection, IntentSize, IntentTarget, MomentumConfig, RegimeState, SignalGenerator,
    StrategyKind, Tick, TickContext, TradeIntent,
};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use crate::indicators::PriceWindow;

/// Momentum/RSI trend follower on a single instrument.
///
/// Enters long in BULL when momentum is strong and RSI is not overbought; exits on
/// overbought RSI, momentum reversal, or a BEAR regime. Both indicators run on
/// completed daily closes; intraday ticks only move the current session's close.
pub struct MomentumGenerator {
    symbol: String,
    config: MomentumConfig,
    window: PriceWindow,
    session: Option<(NaiveDate, f64)>,
}

impl MomentumGenerator {
    #[must_use]
    pub fn new(symbol: &str, config: MomentumConfig) -> Self {
        Self {
            symbol: symbol.to_string(),
            window: PriceWindow::new(config.momentum_period, config.rsi_period),
            config,
            session: None,
        }
    }

    fn flat(&self, tag: &str, confidence: f64) -> TradeIntent {
        TradeIntent::new(
            StrategyKind::Momentum,
            IntentTarget::Instrument(self.symbol.clone()),
            IntentDirection::Flat,
            IntentSize::All,
        )
        .with_confidence(confidence)
        .with_tag(tag)
    }
}

impl SignalGenerator for MomentumGenerator {
    fn observe(&mut self, tick: &Tick) {
        let Some(close) = tick
            .bar(&self.symbol)
            .filter(|bar| bar.is_priced())
            .and_then(|bar| bar.close.to_f64())
        else {
            return;
        };
        let date = tick.date();
        match self.session {
            Some((day, _)) if date < day => {}
            Some((day, previous)) if date > day => {
                self.window.push(previous);
                self.session = Some((date, close));
            }
            _ => self.session = Some((date, close)),
        }
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent> {
        if ctx.tick.bar(&self.symbol).is_none() || ctx.verdict.is_halted() {
            return vec![];
        }
        let Some(regime) = ctx.regime else {
            return vec![];
        };
        let invested = ctx.tick.portfolio.is_invested(&self.symbol);

        if regime == RegimeState::Bear {
            if invested {
                info!(symbol = %self.symbol, "BEAR regime, exiting momentum position");
                return vec![self.flat("RegimeExit", 1.0)];
            }
            return vec![];
        }

        let (Some(momentum), Some(rsi)) = (self.window.momentum(), self.window.rsi()) else {
            return vec![];
        };
        debug!(symbol = %self.symbol, momentum, rsi, regime = %regime, "Momentum update");

        if invested {
            if rsi > self.config.overbought {
                info!(symbol = %self.symbol, rsi, "RSI overbought, exiting");
                return vec![self.flat("Overbought", 0.9)];
            }
            if momentum < self.config.exit_threshold {
                info!(symbol = %self.symbol, momentum, "Momentum reversal, exiting");
                return vec![self.flat("MomentumReversal", 0.9)];
            }
            return vec![];
        }

        if regime == RegimeState::Bull
            && momentum > self.config.entry_threshold
            && rsi < self.config.overbought
        {
            info!(symbol = %self.symbol, momentum, rsi, "Momentum entry");
            return vec![TradeIntent::new(
                StrategyKind::Momentum,
                IntentTarget::Instrument(self.symbol.clone()),
                IntentDirection::Buy,
                IntentSize::Weight(self.config.weight),
            )
            .with_confidence((momentum / 20.0).min(1.0))
            .with_horizon(14)
            .with_tag("MomentumEntry")];
        }

        vec![]
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use regime_engine_core::{Bar, BreakerVerdict, Holding, PortfolioFacts, Tick};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn config() -> MomentumConfig {
        MomentumConfig {
            momentum_period: 3,
            rsi_period: 3,
            ..MomentumConfig::default()
        }
    }

    fn tick(day: i64, close: Decimal, invested: bool) -> Tick {
        tick_at(day, 15, close, invested)
    }

    fn tick_at(day: i64, hour: u32, close: Decimal, invested: bool) -> Tick {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap() + Duration::days(day);
        let mut portfolio = PortfolioFacts::all_cash(dec!(100000));
        if invested {
            portfolio.holdings.insert(
                "BTCUSD".to_string(),
                Holding {
                    quantity: dec!(0.1),
                    average_price: dec!(40000),
                    unrealized_pnl_pct: None,
                },
            );
        }
        Tick::new(ts, portfolio).with_bar(
            "BTCUSD",
            Bar {
                open: close,
                high: close,
                low: close,
                close,
                volume: dec!(1),
            },
        )
    }

    fn step(generator: &mut MomentumGenerator, t: &Tick, regime: Option<RegimeState>) -> Vec<TradeIntent> {
        generator.observe(t);
        generator.update(&TickContext {
            regime,
            verdict: BreakerVerdict::Trade,
            tick: t,
        })
    }

    /// One tick per day for each close, then a tick the next morning so the last day
    /// completes. Returns that morning's intents.
    fn run(
        generator: &mut MomentumGenerator,
        closes: &[Decimal],
        regime: Option<RegimeState>,
        invested: bool,
    ) -> Vec<TradeIntent> {
        for (i, close) in closes.iter().enumerate() {
            step(generator, &tick(i as i64, *close, invested), regime);
        }
        let last = closes.last().copied().unwrap_or(dec!(100));
        step(generator, &tick(closes.len() as i64, last, invested), regime)
    }

    /// Strong rise with one shallow dip: 12% momentum, RSI 75.
    fn choppy_rally() -> Vec<Decimal> {
        vec![dec!(100), dec!(110), dec!(104), dec!(112)]
    }

    #[test]
    fn enters_in_bull_on_strong_momentum() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let closes = [dec!(100), dec!(110), dec!(100), dec!(108)];
        let intents = run(&mut generator, &closes, Some(RegimeState::Bull), false);

        // momentum 8%, RSI 18 / 28 of 100, about 64
        assert_eq!(intents.len(), 1);
        let intent = &intents[0];
        assert_eq!(intent.direction, IntentDirection::Buy);
        assert_eq!(intent.size, IntentSize::Weight(dec!(0.10)));
        assert_eq!(intent.horizon_days, 14);
        assert!((intent.confidence.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn intraday_ticks_roll_into_daily_closes() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        // Daily closes 100, 110, 100, 108 with noisy intraday prints.
        for (day, close) in [dec!(100), dec!(110), dec!(100), dec!(108)].iter().enumerate() {
            for (hour, price) in [(10, dec!(150)), (12, dec!(60)), (15, *close)] {
                let t = tick_at(day as i64, hour, price, false);
                step(&mut generator, &t, Some(RegimeState::Bull));
            }
        }
        let morning = tick_at(4, 10, dec!(108), false);
        let intents = step(&mut generator, &morning, Some(RegimeState::Bull));
        assert_eq!(intents.len(), 1);
        assert!((intents[0].confidence.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn overbought_rally_does_not_enter() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        // RSI 75 despite 12% momentum.
        assert!(run(&mut generator, &choppy_rally(), Some(RegimeState::Bull), false).is_empty());
    }

    #[test]
    fn neutral_blocks_entries() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let closes = [dec!(100), dec!(110), dec!(100), dec!(108)];
        assert!(run(&mut generator, &closes, Some(RegimeState::Neutral), false).is_empty());
    }

    #[test]
    fn neutral_still_exits_on_reversal() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let closes = [dec!(100), dec!(95), dec!(97), dec!(90)];
        let intents = run(&mut generator, &closes, Some(RegimeState::Neutral), true);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].direction, IntentDirection::Flat);
        assert_eq!(intents[0].tag.as_deref(), Some("MomentumReversal"));
    }

    #[test]
    fn exits_when_overbought() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let intents = run(&mut generator, &choppy_rally(), Some(RegimeState::Bull), true);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].tag.as_deref(), Some("Overbought"));
        assert_eq!(intents[0].confidence, Some(0.9));
    }

    #[test]
    fn bear_forces_exit_only_when_invested() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let intents = run(&mut generator, &[dec!(100)], Some(RegimeState::Bear), true);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].tag.as_deref(), Some("RegimeExit"));

        let mut generator = MomentumGenerator::new("BTCUSD", config());
        assert!(run(&mut generator, &[dec!(100)], Some(RegimeState::Bear), false).is_empty());
    }

    #[test]
    fn unknown_regime_is_a_no_op() {
        let mut generator = MomentumGenerator::new("BTCUSD", config());
        let closes = [dec!(100), dec!(110), dec!(100), dec!(108)];
        assert!(run(&mut generator, &closes, None, true).is_empty());
    }
}
