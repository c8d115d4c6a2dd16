//! Deterministic option-chain screening.
//!
//! Everything here is a pure function of one chain snapshot (plus the caller's
//! configuration), except the IV cache which carries the last observed at-the-money
//! implied volatility per underlying across ticks.

pub mod iv_cache;
pub mod liquidity;
pub mod selector;
pub mod spread;

pub use iv_cache::IvCache;
pub use liquidity::is_liquid;
pub use selector::select_by_delta_and_window;
pub use spread::{build_vertical_spread, SpreadError, SpreadLegRole, SpreadRequest};
