//! Weekly implied-volatility screener.
//!
//! On the configured weekday it ranks the universe by implied volatility (absolute on the
//! first screen, increase since the previous screen afterwards), keeps names whose option
//! flow leans to calls, and buys small fixed-weight positions up to a portfolio cap.
//! Every tick it also runs stop-loss/take-profit exits on the names it bought.
//!
//! The IV baseline only advances on screens that produced candidates; an empty baseline
//! means the next screen ranks absolute IV again.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use regime_engine_core::{
    IntentDirection, IntentSize, IntentTarget, OptionRight, RegimeState, ScreenerConfig,
    SignalGenerator, StrategyKind, Tick, TickContext, TradeIntent,
};
use regime_engine_options::IvCache;
use tracing::{debug, info};

use crate::exits::{check_exit, ExitRules};

pub struct IvScreener {
    config: ScreenerConfig,
    cache: IvCache,
    previous: HashMap<String, f64>,
    last_screen: Option<NaiveDate>,
    /// Names bought by the screener, with the day the buy was issued.
    opened: BTreeMap<String, NaiveDate>,
}

impl IvScreener {
    #[must_use]
    pub fn new(config: ScreenerConfig) -> Self {
        Self {
            cache: IvCache::new(&config),
            config,
            previous: HashMap::new(),
            last_screen: None,
            opened: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &IvCache {
        &self.cache
    }

    fn exits(&mut self, tick: &Tick) -> Vec<TradeIntent> {
        let rules = ExitRules {
            stop_loss_pct: self.config.stop_loss_pct,
            take_profit_pct: self.config.take_profit_pct,
        };
        let today = tick.date();
        let mut intents = Vec::new();
        let mut closed = Vec::new();
        for (symbol, bought) in &self.opened {
            let holding = tick.portfolio.holding(symbol).filter(|h| h.is_invested());
            let Some(holding) = holding else {
                // Unfilled, or closed elsewhere.
                if today > *bought {
                    debug!(symbol = %symbol, "Screened name no longer held, forgetting it");
                    closed.push(symbol.clone());
                }
                continue;
            };
            if let Some(reason) = check_exit(symbol, holding, &rules) {
                intents.push(
                    TradeIntent::new(
                        StrategyKind::IvScreener,
                        IntentTarget::Instrument(symbol.clone()),
                        IntentDirection::Flat,
                        IntentSize::All,
                    )
                    .with_tag(&reason.to_string()),
                );
                closed.push(symbol.clone());
            }
        }
        for symbol in closed {
            self.opened.remove(&symbol);
        }
        intents
    }

    /// Ranked `(symbol, score)` pairs for this screen. The stored baseline moves to this
    /// screen's snapshot only when at least one candidate survives.
    fn rank(&mut self, tick: &Tick) -> Vec<(String, f64)> {
        self.cache.prune(&tick.universe);
        let current = self.cache.snapshot_for(&tick.universe);
        let initial = self.previous.is_empty();

        let mut scored: Vec<(String, f64)> = if initial {
            current.iter().map(|(s, iv)| (s.clone(), *iv)).collect()
        } else {
            current
                .iter()
                .filter_map(|(s, iv)| {
                    let increase = iv - self.previous.get(s)?;
                    (increase > 0.0).then(|| (s.clone(), increase))
                })
                .collect()
        };
        debug!(candidates = scored.len(), initial, "IV screen scored");

        let min_ratio = self.config.min_call_put_ratio;
        scored.retain(|(symbol, _)| {
            tick.chain(symbol).is_some_and(|chain| {
                let ratio = call_put_ratio(
                    chain.total_volume(OptionRight::Call),
                    chain.total_volume(OptionRight::Put),
                );
                ratio >= min_ratio
            })
        });
        if scored.is_empty() {
            info!(initial, "No screen candidates, keeping the IV baseline");
            return scored;
        }
        self.previous = current;
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(self.config.top_n);
        scored
    }

    fn screen(&mut self, tick: &Tick) -> Vec<TradeIntent> {
        let today = tick.date();
        let ranked = self.rank(tick);
        let mut allocation = tick.portfolio.holdings_allocation();
        let weight = self.config.position_allocation;
        let mut intents = Vec::new();

        for (symbol, score) in ranked {
            if tick.portfolio.is_invested(&symbol) {
                continue;
            }
            if allocation + weight > self.config.max_portfolio_allocation {
                info!(allocation = %allocation, "Screener allocation cap reached");
                break;
            }
            info!(symbol = %symbol, score, allocation = %allocation, "Screener buy");
            allocation += weight;
            self.opened.insert(symbol.clone(), today);
            intents.push(
                TradeIntent::new(
                    StrategyKind::IvScreener,
                    IntentTarget::Instrument(symbol),
                    IntentDirection::Buy,
                    IntentSize::Weight(weight),
                )
                .with_horizon(7)
                .with_tag("IvScreen"),
            );
        }
        intents
    }
}

/// Call volume over put volume; infinite when only calls traded.
fn call_put_ratio(calls: u64, puts: u64) -> f64 {
    match (calls, puts) {
        (0, 0) => 0.0,
        (_, 0) => f64::INFINITY,
        (c, p) => c as f64 / p as f64,
    }
}

impl SignalGenerator for IvScreener {
    fn observe(&mut self, tick: &Tick) {
        if self.config.enabled {
            self.cache.update(tick);
        }
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> Vec<TradeIntent> {
        if !self.config.enabled || ctx.verdict.is_halted() {
            return vec![];
        }
        let mut intents = self.exits(ctx.tick);

        let today = ctx.tick.date();
        let due = today.weekday() == self.config.weekday && self.last_screen != Some(today);
        let allowed = matches!(ctx.regime, Some(RegimeState::Bull | RegimeState::Neutral));
        if due && allowed {
            self.last_screen = Some(today);
            intents.extend(self.screen(ctx.tick));
        }
        intents
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::IvScreener
    }
}
