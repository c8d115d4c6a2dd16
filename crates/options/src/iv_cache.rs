//! Rolling cache of at-the-money implied volatility per underlying.

use std::collections::HashMap;

use chrono::NaiveDate;
use regime_engine_core::{OptionChain, OptionContract, OptionRight, ScreenerConfig, Tick};
use rust_decimal::Decimal;
use tracing::trace;

/// Last observed ATM call IV per underlying, refreshed every tick.
#[derive(Debug, Clone)]
pub struct IvCache {
    dte_min: i64,
    dte_max: i64,
    fallback_dte: i64,
    fallback_count: usize,
    values: HashMap<String, f64>,
}

impl IvCache {
    #[must_use]
    pub fn new(config: &ScreenerConfig) -> Self {
        Self {
            dte_min: config.iv_dte_min,
            dte_max: config.iv_dte_max,
            fallback_dte: config.iv_fallback_dte,
            fallback_count: config.iv_fallback_count,
            values: HashMap::new(),
        }
    }

    /// Refreshes every chain on the tick whose underlying has a positive close.
    pub fn update(&mut self, tick: &Tick) {
        let today = tick.date();
        for (underlying, chain) in &tick.chains {
            let Some(price) = tick.bar(underlying).map(|b| b.close) else {
                continue;
            };
            if price <= Decimal::ZERO {
                continue;
            }
            if let Some(iv) = self.atm_iv(chain, price, today) {
                trace!(underlying = %underlying, iv, "Cached implied volatility");
                self.values.insert(underlying.clone(), iv);
            }
        }
    }

    #[must_use]
    pub fn get(&self, underlying: &str) -> Option<f64> {
        self.values.get(underlying).copied()
    }

    /// Current values for the given universe only.
    #[must_use]
    pub fn snapshot_for(&self, universe: &[String]) -> HashMap<String, f64> {
        universe
            .iter()
            .filter_map(|s| self.values.get(s).map(|iv| (s.clone(), *iv)))
            .collect()
    }

    /// Drops entries for instruments that left the universe.
    pub fn prune(&mut self, universe: &[String]) {
        self.values.retain(|symbol, _| universe.contains(symbol));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn atm_iv(&self, chain: &OptionChain, price: Decimal, today: NaiveDate) -> Option<f64> {
        let active: Vec<&OptionContract> = chain
            .of_right(OptionRight::Call)
            .filter(|c| c.volume_or_zero() > 0 || c.open_interest_or_zero() > 0)
            .collect();

        let mut calls: Vec<&OptionContract> = active
            .iter()
            .copied()
            .filter(|c| (self.dte_min..=self.dte_max).contains(&c.days_to_expiry(today)))
            .collect();
        if calls.is_empty() {
            calls = active;
            calls.sort_by_key(|c| (c.days_to_expiry(today) - self.fallback_dte).abs());
            calls.truncate(self.fallback_count);
        }

        let atm = calls.into_iter().min_by_key(|c| (c.strike - price).abs())?;
        atm.implied_volatility.filter(|iv| iv.is_finite() && *iv > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use regime_engine_core::{Bar, PortfolioFacts};
    use rust_decimal_macros::dec;

    fn tick_with(chain: OptionChain, close: Decimal) -> Tick {
        let ts = Utc.with_ymd_and_hms(2024, 2, 5, 15, 0, 0).unwrap();
        Tick::new(ts, PortfolioFacts::all_cash(dec!(100000)))
            .with_bar(
                "GME",
                Bar {
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: dec!(1000),
                },
            )
            .with_chain(chain)
    }

    fn call(dte: i64, strike: Decimal, iv: f64, volume: u64) -> OptionContract {
        let today = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        let mut c = OptionContract::new("GME", today + Duration::days(dte), strike, OptionRight::Call);
        c.implied_volatility = Some(iv);
        c.volume = Some(volume);
        c
    }

    #[test]
    fn caches_strike_nearest_the_underlying() {
        let chain = OptionChain::new(
            "GME",
            vec![
                call(21, dec!(20), 0.9, 10),
                call(21, dec!(25), 1.1, 10),
                call(21, dec!(30), 1.4, 10),
            ],
        );
        let mut cache = IvCache::new(&ScreenerConfig::default());
        cache.update(&tick_with(chain, dec!(24)));
        assert_eq!(cache.get("GME"), Some(1.1));
    }

    #[test]
    fn falls_back_to_expiries_nearest_target_dte() {
        let chain = OptionChain::new(
            "GME",
            vec![call(2, dec!(25), 2.0, 10), call(60, dec!(25), 0.7, 10)],
        );
        let mut cache = IvCache::new(&ScreenerConfig {
            iv_fallback_count: 1,
            ..ScreenerConfig::default()
        });
        cache.update(&tick_with(chain, dec!(25)));
        // |2 - 23| = 21 beats |60 - 23| = 37.
        assert_eq!(cache.get("GME"), Some(2.0));
    }

    #[test]
    fn ignores_dead_contracts_and_missing_prices() {
        let chain = OptionChain::new("GME", vec![call(21, dec!(25), 1.1, 0)]);
        let mut cache = IvCache::new(&ScreenerConfig::default());
        cache.update(&tick_with(chain.clone(), dec!(25)));
        assert!(cache.is_empty());

        let live = OptionChain::new("GME", vec![call(21, dec!(25), 1.1, 5)]);
        cache.update(&tick_with(live, dec!(0)));
        assert!(cache.is_empty());
    }

    #[test]
    fn prune_keeps_only_universe_members() {
        let chain = OptionChain::new("GME", vec![call(21, dec!(25), 1.1, 5)]);
        let mut cache = IvCache::new(&ScreenerConfig::default());
        cache.update(&tick_with(chain, dec!(25)));
        assert_eq!(cache.len(), 1);

        cache.prune(&["AMC".to_string()]);
        assert!(cache.is_empty());
    }
}
