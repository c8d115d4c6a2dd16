//! Per-tick market and portfolio inputs supplied by the host platform.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::options::OptionChain;

/// OHLCV bar for one instrument on one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// A bar is usable when both open and close are strictly positive.
    #[must_use]
    pub fn is_priced(&self) -> bool {
        self.open > Decimal::ZERO && self.close > Decimal::ZERO
    }
}

/// A single holding as reported by the portfolio service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// Signed quantity (shares or contracts). Negative means short.
    pub quantity: Decimal,
    pub average_price: Decimal,
    /// Unrealized P&L as a fraction of cost (e.g. -0.15 = down 15%).
    #[serde(default)]
    pub unrealized_pnl_pct: Option<Decimal>,
}

impl Holding {
    #[must_use]
    pub fn is_invested(&self) -> bool {
        !self.quantity.is_zero()
    }
}

/// Portfolio facts for the current tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioFacts {
    #[serde(default)]
    pub holdings: HashMap<String, Holding>,
    pub total_portfolio_value: Decimal,
    pub total_holdings_value: Decimal,
    pub cash: Decimal,
}

impl PortfolioFacts {
    /// Portfolio consisting only of cash.
    #[must_use]
    pub fn all_cash(cash: Decimal) -> Self {
        Self {
            holdings: HashMap::new(),
            total_portfolio_value: cash,
            total_holdings_value: Decimal::ZERO,
            cash,
        }
    }

    #[must_use]
    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    #[must_use]
    pub fn is_invested(&self, symbol: &str) -> bool {
        self.holding(symbol).is_some_and(Holding::is_invested)
    }

    /// Signed quantity held, zero when absent.
    #[must_use]
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.holding(symbol).map_or(Decimal::ZERO, |h| h.quantity)
    }

    /// Fraction of portfolio value currently in holdings. Zero for an empty portfolio.
    #[must_use]
    pub fn holdings_allocation(&self) -> Decimal {
        if self.total_portfolio_value <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total_holdings_value / self.total_portfolio_value
    }
}

/// Everything the engine sees on one data update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    /// Latest bar per instrument. Missing entries mean stale or unavailable data.
    #[serde(default)]
    pub snapshots: HashMap<String, Bar>,
    /// Option chains keyed by underlying.
    #[serde(default)]
    pub chains: HashMap<String, OptionChain>,
    pub portfolio: PortfolioFacts,
    /// Equity symbols currently in the tracked universe.
    #[serde(default)]
    pub universe: Vec<String>,
}

impl Tick {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, portfolio: PortfolioFacts) -> Self {
        Self {
            timestamp,
            snapshots: HashMap::new(),
            chains: HashMap::new(),
            portfolio,
            universe: Vec::new(),
        }
    }

    /// Calendar date of the tick.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    #[must_use]
    pub fn bar(&self, symbol: &str) -> Option<&Bar> {
        self.snapshots.get(symbol)
    }

    #[must_use]
    pub fn chain(&self, underlying: &str) -> Option<&OptionChain> {
        self.chains.get(underlying)
    }

    #[must_use]
    pub fn with_bar(mut self, symbol: &str, bar: Bar) -> Self {
        self.snapshots.insert(symbol.to_string(), bar);
        self
    }

    #[must_use]
    pub fn with_chain(mut self, chain: OptionChain) -> Self {
        self.chains.insert(chain.underlying.clone(), chain);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn holdings_allocation_handles_empty_portfolio() {
        let facts = PortfolioFacts::default();
        assert_eq!(facts.holdings_allocation(), Decimal::ZERO);
    }

    #[test]
    fn invested_requires_nonzero_quantity() {
        let mut facts = PortfolioFacts::all_cash(dec!(1000));
        facts.holdings.insert(
            "QQQ".to_string(),
            Holding {
                quantity: dec!(0),
                average_price: dec!(400),
                unrealized_pnl_pct: None,
            },
        );
        assert!(!facts.is_invested("QQQ"));
        assert!(!facts.is_invested("SPY"));

        facts.holdings.get_mut("QQQ").unwrap().quantity = dec!(-3);
        assert!(facts.is_invested("QQQ"));
        assert_eq!(facts.quantity("QQQ"), dec!(-3));
    }
}
