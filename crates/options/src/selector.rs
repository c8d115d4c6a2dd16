use chrono::NaiveDate;
use regime_engine_core::{OptionChain, OptionContract, OptionRight};
use tracing::debug;

/// Picks one contract of `right` with expiry inside `[dte_min, dte_max]`.
///
/// The expiry nearest the window midpoint wins (ties go to the shorter expiry); within
/// it, the contract whose delta is closest to `target_delta`. Contracts without a delta
/// are never candidates. No liquidity screening is done here.
#[must_use]
pub fn select_by_delta_and_window(
    chain: &OptionChain,
    right: OptionRight,
    dte_min: i64,
    dte_max: i64,
    target_delta: f64,
    today: NaiveDate,
) -> Option<OptionContract> {
    let candidates: Vec<(&OptionContract, i64, f64)> = chain
        .of_right(right)
        .filter_map(|c| {
            let dte = c.days_to_expiry(today);
            let delta = c.delta?;
            (dte_min..=dte_max).contains(&dte).then_some((c, dte, delta))
        })
        .collect();

    // Twice the distance to the midpoint, kept integral so half-day midpoints compare exactly.
    let distance = |dte: i64| (2 * dte - (dte_min + dte_max)).abs();
    let best_dte = candidates
        .iter()
        .map(|(_, dte, _)| *dte)
        .min_by_key(|dte| (distance(*dte), *dte))?;

    let mut best: Option<(&OptionContract, f64)> = None;
    for (contract, dte, delta) in &candidates {
        if *dte != best_dte {
            continue;
        }
        let gap = (delta - target_delta).abs();
        if best.map_or(true, |(_, best_gap)| gap < best_gap) {
            best = Some((contract, gap));
        }
    }

    best.map(|(contract, gap)| {
        debug!(
            contract = %contract.display_name(),
            dte = best_dte,
            delta_gap = gap,
            "Selected contract"
        );
        contract.clone()
    })
}
