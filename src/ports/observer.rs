//! Observer port - abstraction for watching a trajectory unfold
//!
//! Observers receive one event when a trajectory starts, one per time step,
//! and one when the trajectory result is complete. They never influence the
//! inference; see [`OutcomeModulator`](super::OutcomeModulator) for the port
//! that does.

use ndarray::ArrayView1;

use crate::{Result, inference::TrajectoryResult, model::ModelDims};

/// What happened at one time step.
#[derive(Debug, Clone)]
pub struct StepSummary<'a> {
    /// Time step (0-based)
    pub t: usize,
    /// Number of time steps in the trajectory
    pub horizon: usize,
    /// Realized hidden state per factor
    pub states: &'a [usize],
    /// Realized outcome per modality
    pub outcomes: &'a [usize],
    /// Joint action selected at this step, if any
    pub action: Option<&'a [usize]>,
    /// Expected precision after the update
    pub precision: f64,
    /// Policies still under consideration
    pub live_policies: usize,
    /// Posterior over all policies at this step (zero for pruned ones)
    pub policy_posterior: ArrayView1<'a, f64>,
}

/// Observer trait for monitoring a trajectory
///
/// # Event Sequence
///
/// 1. `on_trajectory_start(dims)` - once, after validation
/// 2. `on_step(summary)` - after every completed time step
/// 3. `on_trajectory_end(result)` - once, after learning
///
/// # Examples
///
/// ```no_run
/// use active_mdp::ports::{StepSummary, TrajectoryObserver};
///
/// struct PrecisionRecorder {
///     values: Vec<f64>,
/// }
///
/// impl TrajectoryObserver for PrecisionRecorder {
///     fn on_step(&mut self, summary: &StepSummary<'_>) -> active_mdp::Result<()> {
///         self.values.push(summary.precision);
///         Ok(())
///     }
/// }
/// ```
pub trait TrajectoryObserver: Send {
    /// Called once before the first time step.
    fn on_trajectory_start(&mut self, _dims: &ModelDims) -> Result<()> {
        Ok(())
    }

    /// Called after every time step, including the last one.
    fn on_step(&mut self, _summary: &StepSummary<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once the result, including learned parameters, is available.
    fn on_trajectory_end(&mut self, _result: &TrajectoryResult) -> Result<()> {
        Ok(())
    }
}
