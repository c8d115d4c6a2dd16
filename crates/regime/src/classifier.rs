use regime_engine_core::{RegimeConfig, RegimeState};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hmm::{FitOptions, GaussianHmm, HmmError};

const N_STATES: usize = 3;
/// Column of the observation matrix holding volatility-index returns.
const VOLATILITY_DIM: usize = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegimeError {
    #[error("insufficient history: need {required} returns, have index={index} volatility={volatility}")]
    InsufficientData {
        required: usize,
        index: usize,
        volatility: usize,
    },
    #[error("regime fit failed: {0}")]
    FitFailure(#[from] HmmError),
}

/// Diagnostics from the most recent successful fit.
#[derive(Debug, Clone)]
pub struct RegimeFit {
    pub state: RegimeState,
    /// Raw hidden-state id of the final decoded sample.
    pub hidden_state: usize,
    /// Mean volatility-index return per hidden state, indexed by state id.
    pub volatility_means: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

/// Labels hidden-state ids by their volatility mean: lowest is `Bull`, highest is
/// `Bear`, everything in between `Neutral`. Returned vector is indexed by state id.
#[must_use]
pub fn label_states(volatility_means: &[f64]) -> Vec<RegimeState> {
    let mut order: Vec<usize> = (0..volatility_means.len()).collect();
    order.sort_by(|&a, &b| volatility_means[a].total_cmp(&volatility_means[b]));

    let mut labels = vec![RegimeState::Neutral; volatility_means.len()];
    if let Some(&lowest) = order.first() {
        labels[lowest] = RegimeState::Bull;
    }
    if order.len() > 1 {
        if let Some(&highest) = order.last() {
            labels[highest] = RegimeState::Bear;
        }
    }
    labels
}

/// Three-state regime classifier over (index, volatility) log returns.
pub struct RegimeClassifier {
    config: RegimeConfig,
    state: Option<RegimeState>,
    last_fit: Option<RegimeFit>,
}

impl RegimeClassifier {
    #[must_use]
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            state: None,
            last_fit: None,
        }
    }

    #[must_use]
    pub fn current_state(&self) -> Option<RegimeState> {
        self.state
    }

    #[must_use]
    pub fn last_fit(&self) -> Option<&RegimeFit> {
        self.last_fit.as_ref()
    }

    #[must_use]
    pub fn lookback(&self) -> usize {
        self.config.lookback
    }

    /// Refits the model on the tail `lookback` samples of both series.
    ///
    /// On `InsufficientData` the current state is left untouched. On `FitFailure` the
    /// prior state is kept, or set to `Neutral` if there has never been a fit.
    ///
    /// # Errors
    ///
    /// Returns the reason the refit did not produce a fresh state.
    pub fn refit(
        &mut self,
        index_returns: &[f64],
        volatility_returns: &[f64],
    ) -> Result<RegimeState, RegimeError> {
        let lookback = self.config.lookback;
        if index_returns.len() < lookback || volatility_returns.len() < lookback {
            debug!(
                required = lookback,
                index = index_returns.len(),
                volatility = volatility_returns.len(),
                "Not enough history for regime refit"
            );
            return Err(RegimeError::InsufficientData {
                required: lookback,
                index: index_returns.len(),
                volatility: volatility_returns.len(),
            });
        }

        let observations: Vec<Vec<f64>> = index_returns[index_returns.len() - lookback..]
            .iter()
            .zip(&volatility_returns[volatility_returns.len() - lookback..])
            .map(|(a, b)| vec![*a, *b])
            .collect();

        let options = FitOptions {
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
            min_variance: self.config.min_variance,
            seed_dimension: VOLATILITY_DIM,
        };

        let model = match GaussianHmm::fit(&observations, N_STATES, &options) {
            Ok(model) => model,
            Err(e) => {
                let retained = *self.state.get_or_insert(RegimeState::Neutral);
                warn!(error = %e, state = %retained, "Regime fit failed, keeping state");
                return Err(RegimeError::FitFailure(e));
            }
        };

        let path = model.decode(&observations);
        let Some(&hidden_state) = path.last() else {
            return Err(RegimeError::InsufficientData {
                required: lookback,
                index: 0,
                volatility: 0,
            });
        };

        let volatility_means: Vec<f64> = model.means.iter().map(|m| m[VOLATILITY_DIM]).collect();
        let labels = label_states(&volatility_means);
        let state = labels[hidden_state];

        if self.state != Some(state) {
            info!(
                from = ?self.state,
                to = %state,
                iterations = model.iterations,
                log_likelihood = model.log_likelihood,
                "Regime changed"
            );
        }

        self.state = Some(state);
        self.last_fit = Some(RegimeFit {
            state,
            hidden_state,
            volatility_means,
            log_likelihood: model.log_likelihood,
            iterations: model.iterations,
        });
        Ok(state)
    }
}
