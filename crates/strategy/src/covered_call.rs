use regime_engine_core::{
    CoveredCallConfig, IntentDirection, IntentSize, IntentTarget, OptionContract, OptionRight,
    SignalGenerator, StrategyKind, TickContext, TradeIntent,
};
use regime_engine_options::select_by_delta_and_window;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

/// Writes calls against shares already held. Runs in every regime.
pub struct CoveredCallWriter {
    underlying: String,
    config: CoveredCallConfig,
    open_call: Option<(OptionContract, u32)>,
}

impl CoveredCallWriter {
    #[must_use]
    pub fn new(underlying: &str, config: CoveredCallConfig) -> Self {
        Self {
            underlying: underlying.to_string(),
            config,
            open_call: None,
        }
    }

    #[must_use]
    pub fn open_quantity(&self) -> u32 {
        self.open_call.as_ref().map_or(0, |(_, q)| *q)
    }
}

impl SignalGenerator for CoveredCallWriter {
    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent> {
        let today = ctx.tick.date();
        if self.open_call.as_ref().is_some_and(|(c, _)| c.expiry < today) {
            debug!(underlying = %self.underlying, "Covered call expired");
            self.open_call = None;
        }

        if ctx.verdict.is_halted() || self.open_call.is_some() {
            return vec![];
        }

        let shares = ctx.tick.portfolio.quantity(&self.underlying);
        let Some(chain) = ctx.tick.chain(&self.underlying) else {
            return vec![];
        };
        let Some(contract) = select_by_delta_and_window(
            chain,
            OptionRight::Call,
            self.config.dte_min,
            self.config.dte_max,
            self.config.target_delta,
            today,
        ) else {
            return vec![];
        };

        if contract.multiplier.is_zero() || shares < contract.multiplier {
            return vec![];
        }
        let Some(quantity) = (shares / contract.multiplier).floor().to_u32() else {
            return vec![];
        };

        info!(
            contract = %contract.display_name(),
            shares = %shares,
            quantity,
            "Writing covered call"
        );
        let dte = u32::try_from(contract.days_to_expiry(today)).unwrap_or(0);
        self.open_call = Some((contract.clone(), quantity));

        vec![TradeIntent::new(
            StrategyKind::CoveredCall,
            IntentTarget::Contract(contract),
            IntentDirection::Sell,
            IntentSize::Contracts(quantity),
        )
        .with_confidence(0.60)
        .with_horizon(dte)
        .with_tag("CoveredCall")]
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::CoveredCall
    }
}
