//! Observer that reports trajectory events through `tracing`.

use tracing::{debug, info};

use crate::{
    Result,
    inference::TrajectoryResult,
    model::ModelDims,
    ports::{StepSummary, TrajectoryObserver},
    utils::argmax,
};

/// Emits one `info` event per time step and a summary at the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl TrajectoryObserver for LoggingObserver {
    fn on_trajectory_start(&mut self, dims: &ModelDims) -> Result<()> {
        debug!(
            states = ?dims.states,
            outcomes = ?dims.outcomes,
            controls = ?dims.controls,
            "trajectory dimensions"
        );
        Ok(())
    }

    fn on_step(&mut self, summary: &StepSummary<'_>) -> Result<()> {
        info!(
            t = summary.t,
            states = ?summary.states,
            outcomes = ?summary.outcomes,
            action = ?summary.action,
            precision = summary.precision,
            live = summary.live_policies,
            best_policy = ?argmax(summary.policy_posterior),
            "step"
        );
        Ok(())
    }

    fn on_trajectory_end(&mut self, result: &TrajectoryResult) -> Result<()> {
        if let Some(learned) = &result.learned {
            info!(
                likelihood = ?learned.complexity.likelihood,
                transitions = ?learned.complexity.transitions,
                initial_states = ?learned.complexity.initial_states,
                "learning complexity"
            );
        }
        Ok(())
    }
}
