//! Stop-loss and take-profit rules for screener-opened equity positions.

use regime_engine_core::Holding;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "StopLoss"),
            Self::TakeProfit => write!(f, "TakeProfit"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExitRules {
    /// Negative fraction, e.g. `-0.15`.
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

/// Check exit rules against a holding. Stop-loss wins when both would fire.
#[must_use]
pub fn check_exit(symbol: &str, holding: &Holding, rules: &ExitRules) -> Option<ExitReason> {
    if !holding.is_invested() {
        return None;
    }
    let pnl_pct = holding.unrealized_pnl_pct?;

    if pnl_pct <= rules.stop_loss_pct {
        warn!(
            symbol,
            pnl_pct = %pnl_pct,
            threshold = %rules.stop_loss_pct,
            "Stop loss triggered"
        );
        return Some(ExitReason::StopLoss);
    }

    if pnl_pct >= rules.take_profit_pct {
        info!(
            symbol,
            pnl_pct = %pnl_pct,
            threshold = %rules.take_profit_pct,
            "Take profit hit"
        );
        return Some(ExitReason::TakeProfit);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rules() -> ExitRules {
        ExitRules {
            stop_loss_pct: dec!(-0.15),
            take_profit_pct: dec!(0.33),
        }
    }

    fn holding(pnl: Option<Decimal>) -> Holding {
        Holding {
            quantity: dec!(40),
            average_price: dec!(25),
            unrealized_pnl_pct: pnl,
        }
    }

    #[test]
    fn stop_loss_triggers_at_threshold() {
        assert_eq!(
            check_exit("GME", &holding(Some(dec!(-0.15))), &rules()),
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn take_profit_triggers_at_threshold() {
        assert_eq!(
            check_exit("GME", &holding(Some(dec!(0.40))), &rules()),
            Some(ExitReason::TakeProfit)
        );
    }

    #[test]
    fn nothing_inside_the_band() {
        assert_eq!(check_exit("GME", &holding(Some(dec!(0.10))), &rules()), None);
    }

    #[test]
    fn missing_pnl_or_flat_position_is_ignored() {
        assert_eq!(check_exit("GME", &holding(None), &rules()), None);

        let mut flat = holding(Some(dec!(-0.5)));
        flat.quantity = dec!(0);
        assert_eq!(check_exit("GME", &flat, &rules()), None);
    }
}
