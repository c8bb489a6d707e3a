//! Subcommands of the `active-mdp` binary

pub mod demo;
pub mod inspect;
pub mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::{
    InferenceOptions, TrajectoryRunner,
    adapters::LoggingObserver,
    cli::output::{create_spinner, print_kv, print_section, print_trajectory},
    export::TraceCsvExporter,
    inference::TrajectoryResult,
    model::GenerativeModel,
};

/// Hyperparameter overrides shared by the commands that run trajectories
#[derive(Args, Debug, Clone, Default)]
pub struct InferenceArgs {
    /// Inverse temperature of action selection
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Prior rate of precision (precision = 1/beta)
    #[arg(long)]
    pub beta: Option<f64>,

    /// Learning rate for concentration parameters
    #[arg(long)]
    pub eta: Option<f64>,

    /// Time constant of belief updates
    #[arg(long)]
    pub tau: Option<f64>,

    /// Residual-uncertainty threshold for early termination
    #[arg(long)]
    pub chi: Option<f64>,

    /// Iterations of belief and precision updates per step
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Keep precision fixed at 1/beta
    #[arg(long)]
    pub fixed_precision: bool,

    /// Stop once no uncertainty about initial states remains
    #[arg(long)]
    pub early_termination: bool,

    /// Skip concentration-parameter learning
    #[arg(long)]
    pub no_learning: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,
}

impl InferenceArgs {
    /// Apply the overrides on top of the default options.
    pub fn to_options(&self) -> InferenceOptions {
        let mut options = InferenceOptions::default()
            .with_fixed_precision(self.fixed_precision)
            .with_early_termination(self.early_termination)
            .with_learning(!self.no_learning);
        if let Some(alpha) = self.alpha {
            options = options.with_alpha(alpha);
        }
        if let Some(beta) = self.beta {
            options = options.with_beta(beta);
        }
        if let Some(eta) = self.eta {
            options = options.with_eta(eta);
        }
        if let Some(tau) = self.tau {
            options = options.with_tau(tau);
        }
        if let Some(chi) = self.chi {
            options = options.with_chi(chi);
        }
        if let Some(iterations) = self.iterations {
            options = options.with_iterations(iterations);
        }
        if let Some(seed) = self.seed {
            options = options.with_seed(seed);
        }
        options
    }
}

/// Where a finished trajectory is written
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the full result as JSON
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write the precision trace as CSV
    #[arg(long)]
    pub trace_csv: Option<PathBuf>,

    /// Write the per-step table as CSV
    #[arg(long)]
    pub steps_csv: Option<PathBuf>,
}

pub(crate) fn run_and_report(title: &str, model: &GenerativeModel, inference: &InferenceArgs, output: &OutputArgs) -> Result<TrajectoryResult> {
    let options = inference.to_options();

    let spinner = create_spinner("Running trajectory...")?;
    let result = TrajectoryRunner::new(model, options)
        .with_observer(Box::new(LoggingObserver))
        .run()
        .context("trajectory failed")?;
    spinner.finish_and_clear();

    print_section(title);
    print_trajectory(&result);
    write_outputs(&result, output)?;
    Ok(result)
}

fn write_outputs(result: &TrajectoryResult, output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.output {
        result
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        print_kv("Result", &path.display().to_string());
    }
    if let Some(path) = &output.trace_csv {
        let rows = TraceCsvExporter::export_precision(result, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        print_kv("Precision trace", &format!("{} ({rows} rows)", path.display()));
    }
    if let Some(path) = &output.steps_csv {
        let rows = TraceCsvExporter::export_steps(result, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        print_kv("Step table", &format!("{} ({rows} rows)", path.display()));
    }
    Ok(())
}
