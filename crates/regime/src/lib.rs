//! Market regime classification.
//!
//! A three-state Gaussian HMM fitted over daily log returns of a broad index and a
//! volatility index. States are labelled by their volatility mean, so the output is
//! stable under any renumbering of the hidden states.

pub mod classifier;
pub mod history;
pub mod hmm;

pub use classifier::{label_states, RegimeClassifier, RegimeError, RegimeFit};
pub use history::{log_returns, DailyCloses, ReferenceHistory};
pub use hmm::{FitOptions, GaussianHmm, HmmError};
