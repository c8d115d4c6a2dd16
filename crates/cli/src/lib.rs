//! Replay driver for the regime engine: CSV loaders and the tick loop the
//! `regime-engine` binary runs.

pub mod replay;

pub use replay::{build_ticks, load_bars, load_chains, load_seed, run, split_seed, ReplaySummary};
