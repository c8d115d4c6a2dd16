//! Engine configuration. Defaults carry the production parameter set.

use chrono::Weekday;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbols: SymbolsConfig,
    pub regime: RegimeConfig,
    pub liquidity: LiquidityConfig,
    pub account: AccountConfig,
    pub momentum: MomentumConfig,
    pub put_writer: PutWriterConfig,
    pub covered_call: CoveredCallConfig,
    pub gap_spread: GapSpreadConfig,
    pub screener: ScreenerConfig,
}

/// Instruments each component reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolsConfig {
    /// Broad index used for regime fitting.
    pub index: String,
    /// Volatility index used for regime fitting and gap triggers.
    pub volatility: String,
    pub momentum: String,
    /// Underlying for the put and covered-call writers.
    pub wheel_underlying: String,
    /// Underlying whose overnight gap gates the spread writer.
    pub gap_underlying: String,
    /// Chain the spread writer trades.
    pub gap_chain: String,
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            index: "SPY".to_string(),
            volatility: "VIX".to_string(),
            momentum: "BTCUSD".to_string(),
            wheel_underlying: "QQQ".to_string(),
            gap_underlying: "QQQ".to_string(),
            gap_chain: "SPY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefitCadence {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Return samples required per series.
    pub lookback: usize,
    pub max_iterations: usize,
    /// Log-likelihood gain below which EM is considered converged.
    pub tolerance: f64,
    /// Floor added to every diagonal variance.
    pub min_variance: f64,
    pub cadence: RefitCadence,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            lookback: 252,
            max_iterations: 100,
            tolerance: 1e-2,
            min_variance: 1e-3,
            cadence: RefitCadence::Monthly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    pub min_bid: Decimal,
    pub min_open_interest: u64,
    /// Maximum (ask - bid) / bid.
    pub max_spread_pct: Decimal,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            min_bid: Decimal::new(8, 2),
            min_open_interest: 100,
            max_spread_pct: Decimal::new(10, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Intraday loss fraction that liquidates the account (negative, e.g. -0.05).
    pub daily_loss_limit: Decimal,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: Decimal::new(-5, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub enabled: bool,
    pub momentum_period: usize,
    pub rsi_period: usize,
    pub overbought: f64,
    /// Momentum percent required to enter.
    pub entry_threshold: f64,
    /// Momentum percent below which an open position exits.
    pub exit_threshold: f64,
    pub weight: Decimal,
    pub monthly_drawdown_limit: Option<Decimal>,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            momentum_period: 14,
            rsi_period: 14,
            overbought: 70.0,
            entry_threshold: 5.0,
            exit_threshold: -5.0,
            weight: Decimal::new(10, 2),
            monthly_drawdown_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PutWriterConfig {
    pub enabled: bool,
    /// Fraction of portfolio value available as collateral.
    pub allocation: Decimal,
    pub target_delta: f64,
    pub dte_min: i64,
    pub dte_max: i64,
    pub monthly_drawdown_limit: Option<Decimal>,
}

impl Default for PutWriterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allocation: Decimal::new(25, 2),
            target_delta: -0.20,
            dte_min: 25,
            dte_max: 45,
            monthly_drawdown_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveredCallConfig {
    pub enabled: bool,
    pub target_delta: f64,
    pub dte_min: i64,
    pub dte_max: i64,
    pub monthly_drawdown_limit: Option<Decimal>,
}

impl Default for CoveredCallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_delta: 0.20,
            dte_min: 25,
            dte_max: 45,
            monthly_drawdown_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapSpreadConfig {
    pub enabled: bool,
    /// Volatility-index gap (fraction) that arms a call spread; negated for puts.
    pub vix_threshold: f64,
    /// Minimum underlying gap for a call spread.
    pub underlying_threshold: f64,
    /// Maximum underlying gap for a put spread.
    pub put_underlying_ceiling: f64,
    pub dte_max: i64,
    pub short_delta: f64,
    pub long_delta: f64,
    pub quantity: u32,
    pub monthly_drawdown_limit: Option<Decimal>,
}

impl Default for GapSpreadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vix_threshold: 0.05,
            underlying_threshold: -0.075,
            put_underlying_ceiling: 0.01,
            dte_max: 3,
            short_delta: 0.16,
            long_delta: 0.10,
            quantity: 5,
            monthly_drawdown_limit: Some(Decimal::new(2, 2)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub enabled: bool,
    pub weekday: Weekday,
    pub top_n: usize,
    pub position_allocation: Decimal,
    pub max_portfolio_allocation: Decimal,
    pub min_call_put_ratio: f64,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub iv_dte_min: i64,
    pub iv_dte_max: i64,
    /// DTE targeted when no call falls inside the primary window.
    pub iv_fallback_dte: i64,
    pub iv_fallback_count: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weekday: Weekday::Mon,
            top_n: 15,
            position_allocation: Decimal::new(2, 2),
            max_portfolio_allocation: Decimal::new(16, 1),
            min_call_put_ratio: 1.10,
            stop_loss_pct: Decimal::new(-15, 2),
            take_profit_pct: Decimal::new(33, 2),
            iv_dte_min: 7,
            iv_dte_max: 39,
            iv_fallback_dte: 23,
            iv_fallback_count: 5,
        }
    }
}

/// Configuration values that cannot produce a working engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
    #[error("{field} must be negative")]
    NotNegative { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("{field} must lie in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
    },
    #[error("DTE window for {strategy} is empty ({min} > {max})")]
    EmptyWindow {
        strategy: &'static str,
        min: i64,
        max: i64,
    },
}

impl EngineConfig {
    /// Checks cross-field invariants the loaders cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regime.lookback < 3 {
            return Err(ConfigError::OutOfRange {
                field: "regime.lookback",
                min: "3".to_string(),
                max: "inf".to_string(),
            });
        }
        if self.regime.max_iterations == 0 {
            return Err(ConfigError::NotPositive {
                field: "regime.max_iterations",
            });
        }
        if self.regime.tolerance <= 0.0 || self.regime.min_variance <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "regime.tolerance/min_variance",
            });
        }
        if self.liquidity.min_bid < Decimal::ZERO {
            return Err(ConfigError::Negative {
                field: "liquidity.min_bid",
            });
        }
        if self.liquidity.max_spread_pct <= Decimal::ZERO {
            return Err(ConfigError::NotPositive {
                field: "liquidity.max_spread_pct",
            });
        }
        if self.account.daily_loss_limit >= Decimal::ZERO {
            return Err(ConfigError::NotNegative {
                field: "account.daily_loss_limit",
            });
        }
        if self.momentum.momentum_period == 0 || self.momentum.rsi_period == 0 {
            return Err(ConfigError::NotPositive {
                field: "momentum periods",
            });
        }
        check_window("put_writer", self.put_writer.dte_min, self.put_writer.dte_max)?;
        check_window(
            "covered_call",
            self.covered_call.dte_min,
            self.covered_call.dte_max,
        )?;
        check_window("gap_spread", 0, self.gap_spread.dte_max)?;
        check_window(
            "screener",
            self.screener.iv_dte_min,
            self.screener.iv_dte_max,
        )?;
        for (field, delta) in [
            ("put_writer.target_delta", self.put_writer.target_delta),
            ("covered_call.target_delta", self.covered_call.target_delta),
            ("gap_spread.short_delta", self.gap_spread.short_delta),
            ("gap_spread.long_delta", self.gap_spread.long_delta),
        ] {
            if !(-1.0..=1.0).contains(&delta) {
                return Err(ConfigError::OutOfRange {
                    field,
                    min: "-1".to_string(),
                    max: "1".to_string(),
                });
            }
        }
        if self.gap_spread.quantity == 0 {
            return Err(ConfigError::NotPositive {
                field: "gap_spread.quantity",
            });
        }
        for (field, limit) in [
            ("momentum", self.momentum.monthly_drawdown_limit),
            ("put_writer", self.put_writer.monthly_drawdown_limit),
            ("covered_call", self.covered_call.monthly_drawdown_limit),
            ("gap_spread", self.gap_spread.monthly_drawdown_limit),
        ] {
            if let Some(limit) = limit {
                if limit <= Decimal::ZERO || limit >= Decimal::ONE {
                    return Err(ConfigError::OutOfRange {
                        field,
                        min: "0".to_string(),
                        max: "1".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_window(strategy: &'static str, min: i64, max: i64) -> Result<(), ConfigError> {
    if min < 0 || min > max {
        return Err(ConfigError::EmptyWindow { strategy, min, max });
    }
    Ok(())
}
