//! Policy precision and the posterior over policies.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::utils::softmax;

/// Smallest rate the update may reach; precision is bounded by its inverse.
pub const MIN_RATE: f64 = 1e-3;

/// Rate parameter of the precision posterior, carried across time steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionState {
    /// Prior rate β
    pub prior_rate: f64,
    /// Posterior rate qβ
    pub rate: f64,
}

impl PrecisionState {
    pub fn new(beta: f64) -> Self {
        Self {
            prior_rate: beta,
            rate: beta,
        }
    }

    /// Expected precision γ = 1/qβ.
    pub fn precision(&self) -> f64 {
        1.0 / self.rate
    }
}

/// Result of one round of precision updating at a single time step.
#[derive(Debug, Clone)]
pub struct PrecisionUpdate {
    /// Final posterior over the scored policies
    pub posterior: Array1<f64>,
    /// Precision after every iteration
    pub precision_trace: Vec<f64>,
    /// Policy posterior after every iteration
    pub posterior_trace: Vec<Array1<f64>>,
}

/// Iterate the precision update and return the policy posterior.
///
/// All vectors are restricted to the live policies: `log_prior` is the log
/// policy prior, `scores` the expected free energy (larger is better) and
/// `free_energy` the negative variational free energy from state estimation.
/// With `fixed` set the precision is held at its prior value 1/β.
pub fn update_precision(
    state: &mut PrecisionState,
    log_prior: ArrayView1<'_, f64>,
    scores: ArrayView1<'_, f64>,
    free_energy: ArrayView1<'_, f64>,
    iterations: usize,
    fixed: bool,
) -> PrecisionUpdate {
    let mut precision_trace = Vec::with_capacity(iterations);
    let mut posterior_trace = Vec::with_capacity(iterations);
    let mut posterior = softmax((&log_prior + &(&scores * state.precision()) + &free_energy).view());

    for _ in 0..iterations {
        let gamma = state.precision();
        let prior_term = &log_prior + &(&scores * gamma);
        posterior = softmax((&prior_term + &free_energy).view());
        let reference = softmax(prior_term.view());

        if fixed {
            state.rate = state.prior_rate;
        } else {
            let expected = (&posterior - &reference).dot(&scores);
            let gradient = state.rate - state.prior_rate + expected;
            state.rate -= gradient / 2.0;
            if state.rate.is_nan() || state.rate < MIN_RATE {
                tracing::warn!(rate = state.rate, floor = MIN_RATE, "precision rate clamped");
                state.rate = MIN_RATE;
            }
        }

        precision_trace.push(state.precision());
        posterior_trace.push(posterior.clone());
    }

    PrecisionUpdate {
        posterior,
        precision_trace,
        posterior_trace,
    }
}
