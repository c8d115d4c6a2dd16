//! Vertical credit spread construction from a single chain snapshot.

use chrono::NaiveDate;
use regime_engine_core::{
    LiquidityConfig, OptionChain, OptionContract, OptionRight, OrderSide, SpreadLeg, SpreadOrder,
};
use thiserror::Error;
use tracing::debug;

use crate::liquidity::is_liquid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadLegRole {
    Short,
    Long,
}

impl std::fmt::Display for SpreadLegRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Long => write!(f, "long"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpreadError {
    #[error("no liquid contract for the {leg} leg")]
    NoLiquidLeg { leg: SpreadLegRole },
    #[error("legs do not form a vertical: short {short}, long {long}")]
    LegMismatch { short: String, long: String },
}

/// What to build. Put targets are given as negative deltas.
#[derive(Debug, Clone, Copy)]
pub struct SpreadRequest {
    pub right: OptionRight,
    pub short_delta: f64,
    pub long_delta: f64,
    pub dte_max: i64,
    pub quantity: u32,
}

/// Builds a credit vertical: sell the leg nearest `short_delta`, buy the leg nearest
/// `long_delta`. Both legs must be liquid, expire within `dte_max` days, and sit at or
/// beyond their target delta (calls `delta <= target`, puts `delta >= target`).
///
/// The limit price is `short.bid - long.ask`.
///
/// # Errors
///
/// `NoLiquidLeg` when either leg has no candidate; `LegMismatch` when the chosen legs
/// expire on different dates or share a strike.
pub fn build_vertical_spread(
    chain: &OptionChain,
    request: &SpreadRequest,
    liquidity: &LiquidityConfig,
    today: NaiveDate,
) -> Result<SpreadOrder, SpreadError> {
    let eligible: Vec<&OptionContract> = chain
        .of_right(request.right)
        .filter(|c| (0..=request.dte_max).contains(&c.days_to_expiry(today)))
        .filter(|c| is_liquid(c, liquidity))
        .collect();

    let short = nearest_beyond(&eligible, request.right, request.short_delta)
        .ok_or(SpreadError::NoLiquidLeg { leg: SpreadLegRole::Short })?;
    let long = nearest_beyond(&eligible, request.right, request.long_delta)
        .ok_or(SpreadError::NoLiquidLeg { leg: SpreadLegRole::Long })?;

    if short.expiry != long.expiry || short.strike == long.strike {
        return Err(SpreadError::LegMismatch {
            short: short.display_name(),
            long: long.display_name(),
        });
    }

    let limit_price = short.bid_or_zero() - long.ask_or_zero();
    debug!(
        short = %short.display_name(),
        long = %long.display_name(),
        limit = %limit_price,
        quantity = request.quantity,
        "Built vertical spread"
    );

    Ok(SpreadOrder {
        right: request.right,
        short_leg: SpreadLeg {
            contract: short.clone(),
            side: OrderSide::Sell,
        },
        long_leg: SpreadLeg {
            contract: long.clone(),
            side: OrderSide::Buy,
        },
        quantity: request.quantity,
        limit_price,
    })
}

fn nearest_beyond<'a>(
    candidates: &[&'a OptionContract],
    right: OptionRight,
    target: f64,
) -> Option<&'a OptionContract> {
    let mut best: Option<(&OptionContract, f64)> = None;
    for contract in candidates {
        let Some(delta) = contract.delta else { continue };
        let beyond = match right {
            OptionRight::Call => delta <= target,
            OptionRight::Put => delta >= target,
        };
        if !beyond {
            continue;
        }
        let gap = (delta - target).abs();
        if best.map_or(true, |(_, best_gap)| gap < best_gap) {
            best = Some((contract, gap));
        }
    }
    best.map(|(c, _)| c)
}
