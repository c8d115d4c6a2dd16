//! Tick-driven decision engine.
//!
//! Each call to [`Orchestrator::on_tick`] refreshes caches, applies the account-wide
//! daily loss limit, refits the regime when due, evaluates per-strategy drawdown
//! breakers and finally runs the signal generators in a fixed order. The result is an
//! ordered list of trade intents; nothing is executed here.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
