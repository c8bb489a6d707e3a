//! Hyperparameters for one trajectory of inference and action selection.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default number of iterations for belief updates and precision updates.
pub const DEFAULT_ITERATIONS: usize = 16;

/// Configuration of the inference scheme.
///
/// All fields have documented defaults; the builder methods override them.
///
/// # Examples
///
/// ```
/// use active_mdp::InferenceOptions;
///
/// let options = InferenceOptions::default()
///     .with_seed(42)
///     .with_alpha(8.0)
///     .with_fixed_precision(true);
/// assert_eq!(options.tau, 4.0);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    /// Inverse temperature of action selection
    pub alpha: f64,
    /// Prior rate of the policy precision (precision = 1/beta)
    pub beta: f64,
    /// Learning rate for concentration parameters
    pub eta: f64,
    /// Time constant of the belief gradient step
    pub tau: f64,
    /// Residual-uncertainty threshold for early termination
    pub chi: f64,
    /// Exponent divisor of the annealing reset before the first inference
    pub annealing: f64,
    /// Iterations of belief updating and of precision updating per time step
    pub iterations: usize,
    /// Policies whose free energy falls more than this many nats below the best are dropped
    pub prune_threshold: f64,
    /// Fix precision at 1/beta instead of updating it
    pub fixed_precision: bool,
    /// Stop the trajectory once no uncertainty about initial states remains
    pub terminate_early: bool,
    /// Update concentration parameters after the trajectory
    pub learning: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            alpha: 16.0,
            beta: 1.0,
            eta: 1.0,
            tau: 4.0,
            chi: 1.0 / 64.0,
            annealing: 4.0,
            iterations: DEFAULT_ITERATIONS,
            prune_threshold: 3.0,
            fixed_precision: false,
            terminate_early: false,
            learning: true,
            seed: None,
        }
    }
}

impl InferenceOptions {
    /// Set the action-selection inverse temperature.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the prior precision rate.
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Set the learning rate.
    pub fn with_eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    /// Set the belief-update time constant.
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Set the early-termination threshold.
    pub fn with_chi(mut self, chi: f64) -> Self {
        self.chi = chi;
        self
    }

    /// Set the iteration count for belief and precision updates.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Fix precision at its prior value.
    pub fn with_fixed_precision(mut self, fixed: bool) -> Self {
        self.fixed_precision = fixed;
        self
    }

    /// Enable or disable early termination.
    pub fn with_early_termination(mut self, enabled: bool) -> Self {
        self.terminate_early = enabled;
        self
    }

    /// Enable or disable concentration-parameter learning.
    pub fn with_learning(mut self, enabled: bool) -> Self {
        self.learning = enabled;
        self
    }

    /// Set the random seed for deterministic behavior.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject non-finite or non-positive hyperparameters.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("tau", self.tau),
            ("chi", self.chi),
            ("annealing", self.annealing),
            ("prune_threshold", self.prune_threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidHyperparameter {
                    name: name.to_string(),
                    value,
                });
            }
        }
        if !self.eta.is_finite() || self.eta < 0.0 {
            return Err(Error::InvalidHyperparameter {
                name: "eta".to_string(),
                value: self.eta,
            });
        }
        if self.iterations == 0 {
            return Err(Error::InvalidConfiguration {
                message: "iterations must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = InferenceOptions::default();
        assert_eq!(options.alpha, 16.0);
        assert_eq!(options.beta, 1.0);
        assert_eq!(options.eta, 1.0);
        assert_eq!(options.tau, 4.0);
        assert_eq!(options.iterations, 16);
        assert_eq!(options.prune_threshold, 3.0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_beta() {
        let err = InferenceOptions::default().with_beta(0.0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidHyperparameter { ref name, .. } if name == "beta"));
    }

    #[test]
    fn validate_rejects_zero_iterations() {
        assert!(InferenceOptions::default().with_iterations(0).validate().is_err());
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let options: InferenceOptions = serde_json::from_str(r#"{"alpha": 4.0}"#).unwrap();
        assert_eq!(options.alpha, 4.0);
        assert_eq!(options.tau, 4.0);
        assert!(options.learning);
    }
}
