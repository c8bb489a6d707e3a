//! Outcome modulation port
//!
//! A modulator sees each time step's realized outcomes together with the
//! agent's predictions and may replace the outcome distributions the agent
//! conditions on. This is the seam where a subordinate inference instance
//! plugs into its parent.

use ndarray::Array1;

use crate::Result;

/// Inputs available to a modulator at one time step.
#[derive(Debug, Clone)]
pub struct ModulationContext<'a> {
    /// Time step (0-based)
    pub t: usize,
    /// Realized hidden state per factor
    pub states: &'a [usize],
    /// Realized outcome per modality
    pub outcomes: &'a [usize],
    /// Outcome distributions the agent predicted for this step, per modality
    pub predicted: &'a [Array1<f64>],
    /// Expected precision carried over from the previous step
    pub precision: f64,
}

/// Replaces outcome distributions before state estimation.
pub trait OutcomeModulator: Send {
    /// Return `(modality, distribution)` pairs to substitute for the one-hot outcomes.
    ///
    /// Distributions are renormalized by the caller; modalities left out keep
    /// their realized one-hot outcome.
    fn modulate(&mut self, context: &ModulationContext<'_>) -> Result<Vec<(usize, Array1<f64>)>>;
}
