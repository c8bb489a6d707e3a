//! Simulate command - run one trajectory of a JSON-defined model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use super::{InferenceArgs, OutputArgs, run_and_report};
use crate::model::GenerativeModel;

#[derive(Parser, Debug)]
#[command(about = "Run one trajectory of a generative model")]
pub struct SimulateArgs {
    /// Path to the model definition (JSON)
    pub model: PathBuf,

    #[command(flatten)]
    pub inference: InferenceArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn execute(args: SimulateArgs) -> Result<()> {
    let model = GenerativeModel::from_json_file(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;
    let title = format!("Trajectory of {}", args.model.display());
    run_and_report(&title, &model, &args.inference, &args.output)?;
    Ok(())
}
