//! Quote quality screen applied before building spreads.

use regime_engine_core::{LiquidityConfig, OptionContract};
use rust_decimal::Decimal;

/// True when the contract has a tradable bid, open interest and a tight enough quote.
///
/// Missing quote fields read as zero and therefore fail.
#[must_use]
pub fn is_liquid(contract: &OptionContract, config: &LiquidityConfig) -> bool {
    let bid = contract.bid_or_zero();
    let ask = contract.ask_or_zero();

    if bid <= Decimal::ZERO || bid <= config.min_bid || ask <= Decimal::ZERO {
        return false;
    }
    if contract.open_interest_or_zero() <= config.min_open_interest {
        return false;
    }
    (ask - bid) / bid < config.max_spread_pct
}
