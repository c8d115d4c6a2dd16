use chrono::{Datelike, NaiveDate};
use regime_engine_core::{
    BreakerVerdict, EngineConfig, RefitCadence, RegimeState, SignalGenerator, Tick, TickContext,
    TradeIntent,
};
use regime_engine_regime::{ReferenceHistory, RegimeClassifier, RegimeError};
use regime_engine_strategy::{
    CoveredCallWriter, DailyBreaker, GapSpreadWriter, IvScreener, MomentumGenerator,
    PeriodBreaker, PutWriter,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

struct Slot {
    generator: Box<dyn SignalGenerator>,
    breaker: Option<PeriodBreaker>,
}

/// Owns every stateful component and runs them in a fixed order on each tick.
pub struct Orchestrator {
    config: EngineConfig,
    classifier: RegimeClassifier,
    history: ReferenceHistory,
    daily: DailyBreaker,
    slots: Vec<Slot>,
    /// Last day a refit was attempted, whatever the outcome.
    last_attempt: Option<NaiveDate>,
    /// Last day a refit ran a fit (successful or not).
    last_refit: Option<NaiveDate>,
}

impl Orchestrator {
    /// Builds the engine with every enabled generator, in execution order.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let symbols = &config.symbols;
        let mut slots = Vec::new();

        if config.momentum.enabled {
            slots.push(Slot {
                generator: Box::new(MomentumGenerator::new(&symbols.momentum, config.momentum.clone())),
                breaker: breaker_for("momentum", config.momentum.monthly_drawdown_limit),
            });
        }
        if config.put_writer.enabled {
            slots.push(Slot {
                generator: Box::new(PutWriter::new(&symbols.wheel_underlying, config.put_writer.clone())),
                breaker: breaker_for("put_writer", config.put_writer.monthly_drawdown_limit),
            });
        }
        if config.covered_call.enabled {
            slots.push(Slot {
                generator: Box::new(CoveredCallWriter::new(
                    &symbols.wheel_underlying,
                    config.covered_call.clone(),
                )),
                breaker: breaker_for("covered_call", config.covered_call.monthly_drawdown_limit),
            });
        }
        if config.gap_spread.enabled {
            slots.push(Slot {
                generator: Box::new(GapSpreadWriter::new(
                    &symbols.volatility,
                    &symbols.gap_underlying,
                    &symbols.gap_chain,
                    config.gap_spread.clone(),
                    config.liquidity.clone(),
                )),
                breaker: breaker_for("gap_spread", config.gap_spread.monthly_drawdown_limit),
            });
        }
        if config.screener.enabled {
            slots.push(Slot {
                generator: Box::new(IvScreener::new(config.screener.clone())),
                breaker: None,
            });
        }

        info!(
            generators = slots.len(),
            lookback = config.regime.lookback,
            cadence = ?config.regime.cadence,
            "Orchestrator initialized"
        );

        Self {
            classifier: RegimeClassifier::new(config.regime.clone()),
            history: ReferenceHistory::new(config.regime.lookback),
            daily: DailyBreaker::new(config.account.daily_loss_limit),
            slots,
            last_attempt: None,
            last_refit: None,
            config,
        }
    }

    /// Warm-starts the reference history with completed daily closes.
    pub fn seed_history(&mut self, index: &[(NaiveDate, f64)], volatility: &[(NaiveDate, f64)]) {
        self.history.seed(index.iter().copied(), volatility.iter().copied());
        debug!(index = index.len(), volatility = volatility.len(), "Reference history seeded");
    }

    #[must_use]
    pub fn regime(&self) -> Option<RegimeState> {
        self.classifier.current_state()
    }

    #[must_use]
    pub fn classifier(&self) -> &RegimeClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn last_refit(&self) -> Option<NaiveDate> {
        self.last_refit
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes one tick and returns the intents it produced, in generator order.
    pub fn on_tick(&mut self, tick: &Tick) -> Vec<TradeIntent> {
        let today = tick.date();
        let equity = tick.portfolio.total_portfolio_value;

        // 1. Caches.
        self.history.observe(
            today,
            close_of(tick, &self.config.symbols.index),
            close_of(tick, &self.config.symbols.volatility),
        );
        for slot in &mut self.slots {
            slot.generator.observe(tick);
        }

        // 2. Account-wide daily loss limit.
        let daily = self.daily.check(equity, today);
        if daily.tripped {
            return vec![TradeIntent::liquidate_all("DailyLossLimit")];
        }
        if daily.verdict.is_halted() {
            return vec![];
        }

        // 3. Regime.
        if self.refit_due(today) {
            self.refit(today);
        }
        let regime = self.classifier.current_state();

        // 4. Per-strategy breakers.
        let verdicts: Vec<BreakerVerdict> = self
            .slots
            .iter_mut()
            .map(|slot| {
                slot.breaker
                    .as_mut()
                    .map_or(BreakerVerdict::Trade, |b| b.check(equity, today))
            })
            .collect();

        // 5. Generators.
        let mut intents = Vec::new();
        for (slot, verdict) in self.slots.iter_mut().zip(verdicts) {
            let ctx = TickContext {
                regime,
                verdict,
                tick,
            };
            let produced = slot.generator.update(&ctx);
            if !produced.is_empty() {
                debug!(strategy = %slot.generator.kind(), count = produced.len(), "Intents produced");
            }
            intents.extend(produced);
        }
        intents
    }

    fn refit_due(&self, today: NaiveDate) -> bool {
        if self.last_attempt == Some(today) {
            return false;
        }
        if self.classifier.current_state().is_none() {
            return true;
        }
        let Some(previous) = self.last_refit else {
            return true;
        };
        match self.config.regime.cadence {
            RefitCadence::Daily => today != previous,
            RefitCadence::Weekly => today.iso_week() != previous.iso_week(),
            RefitCadence::Monthly => {
                (today.year(), today.month()) != (previous.year(), previous.month())
            }
        }
    }

    fn refit(&mut self, today: NaiveDate) {
        self.last_attempt = Some(today);
        let (index, volatility) = self.history.aligned_returns();
        match self.classifier.refit(&index, &volatility) {
            Ok(state) => {
                self.last_refit = Some(today);
                info!(date = %today, regime = %state, samples = index.len(), "Regime refit");
            }
            Err(RegimeError::InsufficientData { required, index, volatility }) => {
                debug!(required, index, volatility, "Regime refit deferred");
            }
            Err(e @ RegimeError::FitFailure(_)) => {
                self.last_refit = Some(today);
                warn!(error = %e, regime = ?self.classifier.current_state(), "Regime refit failed");
            }
        }
    }
}

fn breaker_for(name: &str, limit: Option<Decimal>) -> Option<PeriodBreaker> {
    limit.map(|l| PeriodBreaker::monthly(name, l))
}

fn close_of(tick: &Tick, symbol: &str) -> Option<f64> {
    tick.bar(symbol)
        .filter(|bar| bar.is_priced())
        .and_then(|bar| bar.close.to_f64())
}
