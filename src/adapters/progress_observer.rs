//! Progress bar observer - shows how far a trajectory has run

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Error, Result,
    inference::TrajectoryResult,
    model::ModelDims,
    ports::{StepSummary, TrajectoryObserver},
};

/// Advances a progress bar once per time step.
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    hidden: bool,
}

impl ProgressObserver {
    /// Create a new progress observer
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            hidden: false,
        }
    }

    /// Create an observer whose bar never draws (for tests and piped output)
    pub fn hidden() -> Self {
        Self {
            progress_bar: None,
            hidden: true,
        }
    }

    /// Position of the bar, if it has been created
    pub fn position(&self) -> Option<u64> {
        self.progress_bar.as_ref().map(ProgressBar::position)
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryObserver for ProgressObserver {
    fn on_trajectory_start(&mut self, dims: &ModelDims) -> Result<()> {
        let pb = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(dims.horizon as u64)
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} steps (γ {msg})")
                .map_err(|e| Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        pb.set_length(dims.horizon as u64);
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_step(&mut self, summary: &StepSummary<'_>) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(summary.t as u64 + 1);
            pb.set_message(format!("{:.3}", summary.precision));
        }
        Ok(())
    }

    fn on_trajectory_end(&mut self, result: &TrajectoryResult) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            pb.finish_with_message(format!("{:.3} mean", result.mean_precision()));
        }
        Ok(())
    }
}
