use regime_engine_core::{
    IntentDirection, IntentSize, IntentTarget, OptionContract, OptionRight, PutWriterConfig,
    RegimeState, SignalGenerator, StrategyKind, TickContext, TradeIntent,
};
use regime_engine_options::select_by_delta_and_window;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct ShortPut {
    contract: OptionContract,
    quantity: u32,
}

/// Sells cash-secured puts on one underlying while the regime is BULL.
pub struct PutWriter {
    underlying: String,
    config: PutWriterConfig,
    position: Option<ShortPut>,
}

impl PutWriter {
    #[must_use]
    pub fn new(underlying: &str, config: PutWriterConfig) -> Self {
        Self {
            underlying: underlying.to_string(),
            config,
            position: None,
        }
    }

    /// Contracts currently tracked as sold.
    #[must_use]
    pub fn open_quantity(&self) -> u32 {
        self.position.as_ref().map_or(0, |p| p.quantity)
    }

    fn contracts_for(&self, ctx: &TickContext<'_>, contract: &OptionContract) -> u32 {
        let collateral = contract.collateral();
        if collateral <= Decimal::ZERO {
            return 0;
        }
        let portfolio = &ctx.tick.portfolio;
        let by_allocation =
            (portfolio.total_portfolio_value * self.config.allocation / collateral).floor();
        let by_cash = (portfolio.cash / collateral).floor();
        by_allocation.min(by_cash).max(Decimal::ZERO).to_u32().unwrap_or(0)
    }
}

impl SignalGenerator for PutWriter {
    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent> {
        let today = ctx.tick.date();
        if self.position.as_ref().is_some_and(|p| p.contract.expiry < today) {
            debug!(underlying = %self.underlying, "Tracked put expired, back to flat");
            self.position = None;
        }

        if ctx.verdict.is_halted() {
            return vec![];
        }

        match ctx.regime {
            Some(RegimeState::Bull) => {}
            Some(RegimeState::Bear) => {
                let Some(position) = self.position.take() else {
                    return vec![];
                };
                info!(
                    contract = %position.contract.display_name(),
                    quantity = position.quantity,
                    "BEAR regime, buying back short put"
                );
                return vec![TradeIntent::new(
                    StrategyKind::PutWriter,
                    IntentTarget::Contract(position.contract),
                    IntentDirection::Buy,
                    IntentSize::Contracts(position.quantity),
                )
                .with_confidence(1.0)
                .with_tag("RegimeExit")];
            }
            Some(RegimeState::Neutral) | None => return vec![],
        }

        if self.position.is_some() {
            return vec![];
        }
        let Some(chain) = ctx.tick.chain(&self.underlying) else {
            return vec![];
        };
        let Some(contract) = select_by_delta_and_window(
            chain,
            OptionRight::Put,
            self.config.dte_min,
            self.config.dte_max,
            self.config.target_delta,
            today,
        ) else {
            debug!(underlying = %self.underlying, "No qualifying put this tick");
            return vec![];
        };

        let quantity = self.contracts_for(ctx, &contract);
        if quantity == 0 {
            debug!(
                contract = %contract.display_name(),
                cash = %ctx.tick.portfolio.cash,
                "Not enough collateral for one put"
            );
            return vec![];
        }

        let dte = u32::try_from(contract.days_to_expiry(today)).unwrap_or(0);
        info!(
            contract = %contract.display_name(),
            quantity,
            delta = ?contract.delta,
            "Selling cash-secured put"
        );
        self.position = Some(ShortPut {
            contract: contract.clone(),
            quantity,
        });

        vec![TradeIntent::new(
            StrategyKind::PutWriter,
            IntentTarget::Contract(contract),
            IntentDirection::Sell,
            IntentSize::Contracts(quantity),
        )
        .with_confidence(0.65)
        .with_horizon(dte)
        .with_tag("CashSecuredPut")]
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PutWriter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, option};
    use regime_engine_core::{BreakerVerdict, OptionChain, PortfolioFacts, Tick};
    use rust_decimal_macros::dec;

    fn tick_on(day: u32, cash: Decimal) -> Tick {
        let ts = at(2024, 2, day, 15);
        let today = ts.date_naive();
        let chain = OptionChain::new(
            "QQQ",
            vec![
                option("QQQ", today, 35, dec!(400), OptionRight::Put, -0.20),
                option("QQQ", today, 35, dec!(410), OptionRight::Put, -0.30),
            ],
        );
        Tick::new(ts, PortfolioFacts::all_cash(cash)).with_chain(chain)
    }

    fn ctx(tick: &Tick, regime: Option<RegimeState>) -> TickContext<'_> {
        TickContext {
            regime,
            verdict: BreakerVerdict::Trade,
            tick,
        }
    }

    #[test]
    fn sells_sized_put_in_bull() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let tick = tick_on(1, dec!(500000));
        let intents = writer.update(&ctx(&tick, Some(RegimeState::Bull)));

        assert_eq!(intents.len(), 1);
        let intent = &intents[0];
        assert_eq!(intent.direction, IntentDirection::Sell);
        // 500k * 0.25 / 40k = 3.125
        assert_eq!(intent.size, IntentSize::Contracts(3));
        assert_eq!(intent.confidence, Some(0.65));
        assert_eq!(intent.horizon_days, 35);
        match &intent.target {
            IntentTarget::Contract(c) => assert_eq!(c.strike, dec!(400)),
            other => panic!("unexpected target {other:?}"),
        }
        assert_eq!(writer.open_quantity(), 3);

        // Already short: nothing more.
        assert!(writer.update(&ctx(&tick, Some(RegimeState::Bull))).is_empty());
    }

    #[test]
    fn silent_in_neutral_and_bear_when_flat() {
        let tick = tick_on(1, dec!(500000));
        for regime in [Some(RegimeState::Neutral), Some(RegimeState::Bear), None] {
            let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
            assert!(writer.update(&ctx(&tick, regime)).is_empty());
        }
    }

    #[test]
    fn bear_buys_back_the_tracked_put() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let tick = tick_on(1, dec!(500000));
        writer.update(&ctx(&tick, Some(RegimeState::Bull)));

        let later = tick_on(5, dec!(500000));
        let intents = writer.update(&ctx(&later, Some(RegimeState::Bear)));
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].direction, IntentDirection::Buy);
        assert_eq!(intents[0].size, IntentSize::Contracts(3));
        assert_eq!(intents[0].tag.as_deref(), Some("RegimeExit"));
        assert_eq!(writer.open_quantity(), 0);
    }

    #[test]
    fn cash_caps_the_size() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let mut tick = tick_on(1, dec!(500000));
        tick.portfolio.cash = dec!(50000);
        let intents = writer.update(&ctx(&tick, Some(RegimeState::Bull)));
        assert_eq!(intents[0].size, IntentSize::Contracts(1));
    }

    #[test]
    fn too_little_collateral_emits_nothing() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let tick = tick_on(1, dec!(100000));
        assert!(writer.update(&ctx(&tick, Some(RegimeState::Bull))).is_empty());
        assert_eq!(writer.open_quantity(), 0);
    }

    #[test]
    fn state_resets_after_expiry() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let tick = tick_on(1, dec!(500000));
        writer.update(&ctx(&tick, Some(RegimeState::Bull)));
        assert_eq!(writer.open_quantity(), 3);

        // 2024-02-01 + 35 days = 2024-03-07; a tick after that frees the slot.
        let ts = at(2024, 3, 8, 15);
        let after = Tick::new(ts, PortfolioFacts::all_cash(dec!(500000)));
        assert!(writer.update(&ctx(&after, Some(RegimeState::Neutral))).is_empty());
        assert_eq!(writer.open_quantity(), 0);
    }

    #[test]
    fn halted_verdict_blocks_entries() {
        let mut writer = PutWriter::new("QQQ", PutWriterConfig::default());
        let tick = tick_on(1, dec!(500000));
        let halted = TickContext {
            regime: Some(RegimeState::Bull),
            verdict: BreakerVerdict::Halted,
            tick: &tick,
        };
        assert!(writer.update(&halted).is_empty());
    }
}
