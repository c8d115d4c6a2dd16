//! Trade intents handed to the external execution layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::options::{OptionContract, OptionRight, OrderSide};

/// Which component produced an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    PutWriter,
    CoveredCall,
    GapSpread,
    IvScreener,
    Account,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Momentum => write!(f, "momentum"),
            Self::PutWriter => write!(f, "put_writer"),
            Self::CoveredCall => write!(f, "covered_call"),
            Self::GapSpread => write!(f, "gap_spread"),
            Self::IvScreener => write!(f, "iv_screener"),
            Self::Account => write!(f, "account"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadLeg {
    pub contract: OptionContract,
    pub side: OrderSide,
}

/// Two-leg vertical spread with a net limit price (short bid minus long ask).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadOrder {
    pub right: OptionRight,
    pub short_leg: SpreadLeg,
    pub long_leg: SpreadLeg,
    pub quantity: u32,
    pub limit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTarget {
    Instrument(String),
    Contract(OptionContract),
    Spread(SpreadOrder),
    /// Every position in the account.
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDirection {
    Buy,
    Sell,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSize {
    /// Target fraction of portfolio value.
    Weight(Decimal),
    Contracts(u32),
    /// Whatever is currently held.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub source: StrategyKind,
    pub target: IntentTarget,
    pub direction: IntentDirection,
    pub size: IntentSize,
    pub confidence: Option<f64>,
    pub horizon_days: u32,
    pub tag: Option<String>,
}

impl TradeIntent {
    #[must_use]
    pub fn new(
        source: StrategyKind,
        target: IntentTarget,
        direction: IntentDirection,
        size: IntentSize,
    ) -> Self {
        Self {
            source,
            target,
            direction,
            size,
            confidence: None,
            horizon_days: 1,
            tag: None,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    #[must_use]
    pub const fn with_horizon(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// Close everything held in the account.
    #[must_use]
    pub fn liquidate_all(tag: &str) -> Self {
        Self::new(
            StrategyKind::Account,
            IntentTarget::Account,
            IntentDirection::Flat,
            IntentSize::All,
        )
        .with_tag(tag)
    }

    /// The spread order carried by this intent, if any.
    #[must_use]
    pub const fn spread(&self) -> Option<&SpreadOrder> {
        match &self.target {
            IntentTarget::Spread(order) => Some(order),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let intent = TradeIntent::new(
            StrategyKind::Momentum,
            IntentTarget::Instrument("BTCUSD".to_string()),
            IntentDirection::Buy,
            IntentSize::All,
        )
        .with_confidence(1.7);
        assert_eq!(intent.confidence, Some(1.0));
    }

    #[test]
    fn liquidate_all_serializes_with_snake_case_tags() {
        let intent = TradeIntent::liquidate_all("DailyLossLimit");
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"source\":\"account\""));
        assert!(json.contains("\"direction\":\"flat\""));
        assert!(json.contains("DailyLossLimit"));
    }
}
