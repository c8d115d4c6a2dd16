//! Drawdown breakers.
//!
//! Both breakers are small state machines over `(equity, date)`: they anchor equity on
//! the first check of a period, move from `Active` to `Halted` at most once per period,
//! and reset when the period rolls over. Equity always comes from the caller.

use chrono::{Datelike, NaiveDate};
use regime_engine_core::{BreakerState, BreakerVerdict};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerPeriod {
    Day,
    Month,
}

impl BreakerPeriod {
    /// First calendar date of the period containing `date`.
    #[must_use]
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRiskState {
    pub period_anchor_equity: Decimal,
    pub period_start: Option<NaiveDate>,
    pub state: BreakerState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRiskState {
    pub day_start_equity: Decimal,
    pub day: Option<NaiveDate>,
    pub state: BreakerState,
}

/// Halts a strategy for the rest of the period once equity falls `drawdown_limit`
/// below the period's opening equity.
#[derive(Debug, Clone)]
pub struct PeriodBreaker {
    name: String,
    period: BreakerPeriod,
    drawdown_limit: Decimal,
    risk: StrategyRiskState,
}

impl PeriodBreaker {
    #[must_use]
    pub fn new(name: &str, period: BreakerPeriod, drawdown_limit: Decimal) -> Self {
        Self {
            name: name.to_string(),
            period,
            drawdown_limit,
            risk: StrategyRiskState::default(),
        }
    }

    #[must_use]
    pub fn monthly(name: &str, drawdown_limit: Decimal) -> Self {
        Self::new(name, BreakerPeriod::Month, drawdown_limit)
    }

    pub fn check(&mut self, equity: Decimal, date: NaiveDate) -> BreakerVerdict {
        let start = self.period.start_of(date);
        if self.risk.period_start != Some(start) {
            if self.risk.state == BreakerState::Halted {
                info!(strategy = %self.name, period = %start, "Period rolled over, breaker reset");
            }
            self.risk = StrategyRiskState {
                period_anchor_equity: equity,
                period_start: Some(start),
                state: BreakerState::Active,
            };
        }

        if self.risk.state == BreakerState::Active {
            let floor = self.risk.period_anchor_equity * (Decimal::ONE - self.drawdown_limit);
            if equity < floor {
                warn!(
                    strategy = %self.name,
                    equity = %equity,
                    anchor = %self.risk.period_anchor_equity,
                    limit = %self.drawdown_limit,
                    "Period drawdown limit hit, halting"
                );
                self.risk.state = BreakerState::Halted;
            }
        }

        self.risk.state.into()
    }

    #[must_use]
    pub fn risk_state(&self) -> &StrategyRiskState {
        &self.risk
    }
}

/// Outcome of a daily breaker check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCheck {
    pub verdict: BreakerVerdict,
    /// True only on the check that moved the breaker to `Halted`.
    pub tripped: bool,
}

/// Account-wide daily loss limit.
#[derive(Debug, Clone)]
pub struct DailyBreaker {
    /// Negative fraction, e.g. `-0.05`.
    daily_loss_limit: Decimal,
    risk: AccountRiskState,
}

impl DailyBreaker {
    #[must_use]
    pub fn new(daily_loss_limit: Decimal) -> Self {
        Self {
            daily_loss_limit,
            risk: AccountRiskState::default(),
        }
    }

    pub fn check(&mut self, equity: Decimal, date: NaiveDate) -> DailyCheck {
        if self.risk.day != Some(date) {
            self.risk = AccountRiskState {
                day_start_equity: equity,
                day: Some(date),
                state: BreakerState::Active,
            };
        }

        let mut tripped = false;
        if self.risk.state == BreakerState::Active
            && equity < self.risk.day_start_equity * (Decimal::ONE + self.daily_loss_limit)
        {
            warn!(
                equity = %equity,
                day_start = %self.risk.day_start_equity,
                limit = %self.daily_loss_limit,
                "Daily loss limit hit, liquidating"
            );
            self.risk.state = BreakerState::Halted;
            tripped = true;
        }

        DailyCheck {
            verdict: self.risk.state.into(),
            tripped,
        }
    }

    #[must_use]
    pub fn risk_state(&self) -> &AccountRiskState {
        &self.risk
    }
}
