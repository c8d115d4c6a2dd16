//! Gaussian hidden Markov model with diagonal covariance.
//!
//! Fitted with Baum-Welch using the scaled forward/backward recursions and decoded
//! with Viterbi in log space. Diagonal covariance keeps the fit well conditioned when
//! the observed series are strongly correlated (index vs. volatility returns).

use std::f64::consts::PI;

use thiserror::Error;

/// Errors from fitting or decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    #[error("need at least {required} observations, got {got}")]
    TooFewObservations { required: usize, got: usize },
    #[error("observations must all have {expected} dimensions")]
    DimensionMismatch { expected: usize },
    #[error("non-finite value encountered at EM iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("EM did not converge within {iterations} iterations (last gain {last_gain:.6})")]
    NotConverged { iterations: usize, last_gain: f64 },
}

/// EM stopping rules.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub min_variance: f64,
    /// Dimension used to order samples when seeding the initial means.
    pub seed_dimension: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-2,
            min_variance: 1e-3,
            seed_dimension: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GaussianHmm {
    pub start: Vec<f64>,
    pub transitions: Vec<Vec<f64>>,
    pub means: Vec<Vec<f64>>,
    pub variances: Vec<Vec<f64>>,
    /// Log-likelihood of the training data under the final parameters.
    pub log_likelihood: f64,
    pub iterations: usize,
}

struct Posteriors {
    gamma: Vec<Vec<f64>>,
    xi_sum: Vec<Vec<f64>>,
    log_likelihood: f64,
}

impl GaussianHmm {
    #[must_use]
    pub fn n_states(&self) -> usize {
        self.start.len()
    }

    /// Fits an `n_states` model to `observations` (one row per time step).
    ///
    /// # Errors
    ///
    /// Fails when there are fewer observations than states, rows disagree on
    /// dimension, the likelihood becomes non-finite, or EM does not converge within
    /// `options.max_iterations`.
    pub fn fit(
        observations: &[Vec<f64>],
        n_states: usize,
        options: &FitOptions,
    ) -> Result<Self, HmmError> {
        if observations.len() < n_states.max(2) {
            return Err(HmmError::TooFewObservations {
                required: n_states.max(2),
                got: observations.len(),
            });
        }
        let dim = observations[0].len();
        if dim == 0 || observations.iter().any(|row| row.len() != dim) {
            return Err(HmmError::DimensionMismatch { expected: dim });
        }
        if observations.iter().flatten().any(|x| !x.is_finite()) {
            return Err(HmmError::NonFinite { iteration: 0 });
        }

        let mut model = Self::initialize(observations, n_states, options);
        let mut previous: Option<f64> = None;
        let mut last_gain = f64::INFINITY;

        for iteration in 0..options.max_iterations {
            let posteriors = model.posteriors(observations);
            if !posteriors.log_likelihood.is_finite() {
                return Err(HmmError::NonFinite { iteration });
            }

            if let Some(prev) = previous {
                last_gain = posteriors.log_likelihood - prev;
                if last_gain.abs() < options.tolerance {
                    model.log_likelihood = posteriors.log_likelihood;
                    model.iterations = iteration;
                    return Ok(model);
                }
            }
            previous = Some(posteriors.log_likelihood);

            model.maximize(observations, &posteriors, options.min_variance);
            if model.has_non_finite() {
                return Err(HmmError::NonFinite { iteration });
            }
        }

        Err(HmmError::NotConverged {
            iterations: options.max_iterations,
            last_gain,
        })
    }

    /// Most likely hidden-state sequence.
    #[must_use]
    pub fn decode(&self, observations: &[Vec<f64>]) -> Vec<usize> {
        let n = self.n_states();
        if observations.is_empty() || n == 0 {
            return Vec::new();
        }
        let log_start: Vec<f64> = self.start.iter().map(|p| p.ln()).collect();
        let log_trans: Vec<Vec<f64>> = self
            .transitions
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();

        let mut score: Vec<f64> = (0..n)
            .map(|k| log_start[k] + self.log_emission(k, &observations[0]))
            .collect();
        let mut back: Vec<Vec<usize>> = Vec::with_capacity(observations.len());

        for obs in &observations[1..] {
            let mut next = vec![f64::NEG_INFINITY; n];
            let mut from = vec![0usize; n];
            for k in 0..n {
                for j in 0..n {
                    let candidate = score[j] + log_trans[j][k];
                    if candidate > next[k] {
                        next[k] = candidate;
                        from[k] = j;
                    }
                }
                next[k] += self.log_emission(k, obs);
            }
            back.push(from);
            score = next;
        }

        let mut state = argmax(&score);
        let mut path = vec![state; observations.len()];
        for (t, from) in back.iter().enumerate().rev() {
            state = from[state];
            path[t] = state;
        }
        path
    }

    fn initialize(observations: &[Vec<f64>], n_states: usize, options: &FitOptions) -> Self {
        let dim = observations[0].len();
        let seed = options.seed_dimension.min(dim - 1);
        let count = observations.len() as f64;

        let mut overall_mean = vec![0.0; dim];
        for row in observations {
            for (d, x) in row.iter().enumerate() {
                overall_mean[d] += x / count;
            }
        }
        let mut overall_var = vec![0.0; dim];
        for row in observations {
            for (d, x) in row.iter().enumerate() {
                overall_var[d] += (x - overall_mean[d]).powi(2) / count;
            }
        }

        // Seed each state with the mean of one quantile block along the seed dimension.
        let mut order: Vec<usize> = (0..observations.len()).collect();
        order.sort_by(|&a, &b| observations[a][seed].total_cmp(&observations[b][seed]));
        let block = observations.len() / n_states;
        let means = (0..n_states)
            .map(|k| {
                let lo = k * block;
                let hi = if k + 1 == n_states {
                    observations.len()
                } else {
                    (k + 1) * block
                };
                let members = &order[lo..hi];
                (0..dim)
                    .map(|d| {
                        members.iter().map(|&i| observations[i][d]).sum::<f64>()
                            / members.len() as f64
                    })
                    .collect()
            })
            .collect();

        let uniform = 1.0 / n_states as f64;
        Self {
            start: vec![uniform; n_states],
            transitions: vec![vec![uniform; n_states]; n_states],
            means,
            variances: vec![
                overall_var
                    .iter()
                    .map(|v| v + options.min_variance)
                    .collect();
                n_states
            ],
            log_likelihood: f64::NEG_INFINITY,
            iterations: 0,
        }
    }

    fn log_emission(&self, state: usize, obs: &[f64]) -> f64 {
        self.means[state]
            .iter()
            .zip(&self.variances[state])
            .zip(obs)
            .map(|((mean, var), x)| -0.5 * ((2.0 * PI * var).ln() + (x - mean).powi(2) / var))
            .sum()
    }

    /// E-step: scaled forward/backward.
    fn posteriors(&self, observations: &[Vec<f64>]) -> Posteriors {
        let n = self.n_states();
        let len = observations.len();

        // Emission likelihoods rescaled per time step to avoid underflow.
        let mut emission = vec![vec![0.0; n]; len];
        let mut emission_shift = vec![0.0; len];
        for (t, obs) in observations.iter().enumerate() {
            let logs: Vec<f64> = (0..n).map(|k| self.log_emission(k, obs)).collect();
            let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            emission_shift[t] = max;
            for k in 0..n {
                emission[t][k] = (logs[k] - max).exp();
            }
        }

        let mut alpha = vec![vec![0.0; n]; len];
        let mut scale = vec![0.0; len];
        for k in 0..n {
            alpha[0][k] = self.start[k] * emission[0][k];
        }
        scale[0] = normalize(&mut alpha[0]);
        for t in 1..len {
            for k in 0..n {
                let incoming: f64 = (0..n)
                    .map(|j| alpha[t - 1][j] * self.transitions[j][k])
                    .sum();
                alpha[t][k] = incoming * emission[t][k];
            }
            scale[t] = normalize(&mut alpha[t]);
        }

        let mut beta = vec![vec![1.0; n]; len];
        for t in (0..len - 1).rev() {
            for j in 0..n {
                beta[t][j] = (0..n)
                    .map(|k| self.transitions[j][k] * emission[t + 1][k] * beta[t + 1][k])
                    .sum::<f64>()
                    / scale[t + 1];
            }
        }

        let mut gamma = vec![vec![0.0; n]; len];
        for t in 0..len {
            for k in 0..n {
                gamma[t][k] = alpha[t][k] * beta[t][k];
            }
            normalize(&mut gamma[t]);
        }

        let mut xi_sum = vec![vec![0.0; n]; n];
        for t in 0..len - 1 {
            for j in 0..n {
                for k in 0..n {
                    xi_sum[j][k] += alpha[t][j]
                        * self.transitions[j][k]
                        * emission[t + 1][k]
                        * beta[t + 1][k]
                        / scale[t + 1];
                }
            }
        }

        let log_likelihood = scale
            .iter()
            .zip(&emission_shift)
            .map(|(c, shift)| c.ln() + shift)
            .sum();

        Posteriors {
            gamma,
            xi_sum,
            log_likelihood,
        }
    }

    /// M-step. States with no posterior mass keep their previous parameters.
    fn maximize(&mut self, observations: &[Vec<f64>], post: &Posteriors, min_variance: f64) {
        let n = self.n_states();
        let dim = observations[0].len();

        self.start = post.gamma[0].clone();

        for j in 0..n {
            let row_total: f64 = post.xi_sum[j].iter().sum();
            if row_total > f64::MIN_POSITIVE {
                for k in 0..n {
                    self.transitions[j][k] = post.xi_sum[j][k] / row_total;
                }
            }
        }

        for k in 0..n {
            let weight: f64 = post.gamma.iter().map(|g| g[k]).sum();
            if weight < 1e-10 {
                continue;
            }
            for d in 0..dim {
                let mean = post
                    .gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[k] * x[d])
                    .sum::<f64>()
                    / weight;
                let var = post
                    .gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[k] * (x[d] - mean).powi(2))
                    .sum::<f64>()
                    / weight;
                self.means[k][d] = mean;
                self.variances[k][d] = var + min_variance;
            }
        }
    }

    fn has_non_finite(&self) -> bool {
        self.start
            .iter()
            .chain(self.transitions.iter().flatten())
            .chain(self.means.iter().flatten())
            .chain(self.variances.iter().flatten())
            .any(|x| !x.is_finite())
    }
}

/// Scales `values` to sum to one and returns the original sum.
fn normalize(values: &mut [f64]) -> f64 {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
    total
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three well-separated blocks along dimension 1, with a small deterministic wobble.
    fn blocks() -> Vec<Vec<f64>> {
        let centers = [-2.0, 0.0, 2.0];
        let mut rows = Vec::new();
        for (b, c) in centers.iter().enumerate() {
            for i in 0..40 {
                let wobble = ((i * 7 + b * 3) % 11) as f64 / 11.0 - 0.5;
                rows.push(vec![0.1 * wobble, c + 0.2 * wobble]);
            }
        }
        rows
    }

    fn options() -> FitOptions {
        FitOptions {
            seed_dimension: 1,
            min_variance: 1e-4,
            ..FitOptions::default()
        }
    }

    #[test]
    fn recovers_separated_means() {
        let model = GaussianHmm::fit(&blocks(), 3, &options()).unwrap();
        let mut second: Vec<f64> = model.means.iter().map(|m| m[1]).collect();
        second.sort_by(f64::total_cmp);
        assert!((second[0] + 2.0).abs() < 0.1);
        assert!(second[1].abs() < 0.1);
        assert!((second[2] - 2.0).abs() < 0.1);
        assert!(model.log_likelihood.is_finite());
    }

    #[test]
    fn decode_follows_blocks() {
        let data = blocks();
        let model = GaussianHmm::fit(&data, 3, &options()).unwrap();
        let path = model.decode(&data);
        assert_eq!(path.len(), data.len());
        assert_eq!(path[0], path[39]);
        assert_eq!(path[40], path[79]);
        assert_eq!(path[80], path[119]);
        assert_ne!(path[0], path[40]);
        assert_ne!(path[40], path[80]);
        assert_ne!(path[0], path[80]);
    }

    #[test]
    fn rejects_too_few_observations() {
        let err = GaussianHmm::fit(&[vec![0.0, 0.0], vec![1.0, 1.0]], 3, &options()).unwrap_err();
        assert_eq!(err, HmmError::TooFewObservations { required: 3, got: 2 });
    }

    #[test]
    fn rejects_non_finite_input() {
        let mut data = blocks();
        data[5][1] = f64::NAN;
        assert!(matches!(
            GaussianHmm::fit(&data, 3, &options()),
            Err(HmmError::NonFinite { iteration: 0 })
        ));
    }

    #[test]
    fn reports_non_convergence_when_budget_is_too_small() {
        let opts = FitOptions {
            max_iterations: 1,
            ..options()
        };
        assert!(matches!(
            GaussianHmm::fit(&blocks(), 3, &opts),
            Err(HmmError::NotConverged { iterations: 1, .. })
        ));
    }
}
