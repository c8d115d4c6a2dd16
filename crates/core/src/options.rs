//! Option contract and chain types.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

impl FromStr for OptionRight {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            other => anyhow::bail!("Invalid option right: {other}"),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A quoted option contract on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    /// Contract multiplier (100 for standard US equity options).
    pub multiplier: Decimal,
}

impl OptionContract {
    /// Create a standard US equity options contract with no quote attached.
    #[must_use]
    pub fn new(underlying: &str, expiry: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            underlying: underlying.to_uppercase(),
            strike,
            expiry,
            right,
            bid: None,
            ask: None,
            open_interest: None,
            volume: None,
            delta: None,
            implied_volatility: None,
            multiplier: Decimal::from(100),
        }
    }

    /// Calendar days from `today` until expiry. Negative once expired.
    #[must_use]
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry - today).num_days()
    }

    /// Bid, reading a missing quote as zero.
    #[must_use]
    pub fn bid_or_zero(&self) -> Decimal {
        self.bid.unwrap_or(Decimal::ZERO)
    }

    /// Ask, reading a missing quote as zero.
    #[must_use]
    pub fn ask_or_zero(&self) -> Decimal {
        self.ask.unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn open_interest_or_zero(&self) -> u64 {
        self.open_interest.unwrap_or(0)
    }

    #[must_use]
    pub fn volume_or_zero(&self) -> u64 {
        self.volume.unwrap_or(0)
    }

    /// Cash collateral needed to secure one short put.
    #[must_use]
    pub fn collateral(&self) -> Decimal {
        self.strike * self.multiplier
    }

    /// Human-readable contract description (e.g., "QQQ 400P 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.underlying, self.strike, self.right, self.expiry)
    }
}

/// Raw chain row as delivered by the host, before structural validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecord {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub right: String,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
}

/// All quoted contracts for one underlying on one tick. Not guaranteed sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub contracts: Vec<OptionContract>,
}

impl OptionChain {
    #[must_use]
    pub fn new(underlying: &str, contracts: Vec<OptionContract>) -> Self {
        Self {
            underlying: underlying.to_uppercase(),
            contracts,
        }
    }

    /// Build a chain from raw records, dropping rows that violate structural invariants
    /// (unknown right, delta outside [-1, 1]).
    #[must_use]
    pub fn from_records(underlying: &str, records: Vec<ContractRecord>) -> Self {
        let mut contracts = Vec::with_capacity(records.len());
        for record in records {
            let right = match record.right.parse::<OptionRight>() {
                Ok(right) => right,
                Err(e) => {
                    warn!(underlying, strike = %record.strike, error = %e, "Dropping chain row");
                    continue;
                }
            };
            if let Some(delta) = record.delta {
                if !delta.is_finite() || !(-1.0..=1.0).contains(&delta) {
                    warn!(underlying, strike = %record.strike, delta, "Dropping chain row with delta out of range");
                    continue;
                }
            }
            let mut contract = OptionContract::new(underlying, record.expiry, record.strike, right);
            contract.bid = record.bid;
            contract.ask = record.ask;
            contract.open_interest = record.open_interest;
            contract.volume = record.volume;
            contract.delta = record.delta;
            contract.implied_volatility = record.implied_volatility;
            contracts.push(contract);
        }
        Self::new(underlying, contracts)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Contracts of the given right.
    pub fn of_right(&self, right: OptionRight) -> impl Iterator<Item = &OptionContract> {
        self.contracts.iter().filter(move |c| c.right == right)
    }

    /// Total traded volume for one right. Missing volume counts as zero.
    #[must_use]
    pub fn total_volume(&self, right: OptionRight) -> u64 {
        self.of_right(right).map(OptionContract::volume_or_zero).sum()
    }
}
