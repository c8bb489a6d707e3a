//! Inspect command - validate a model file and print its dimensions

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    cli::output::{print_kv, print_section},
    model::GenerativeModel,
};

#[derive(Parser, Debug)]
#[command(about = "Validate a model definition and print its dimensions")]
pub struct InspectArgs {
    /// Path to the model definition (JSON)
    pub model: PathBuf,
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let model = GenerativeModel::from_json_file(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;
    let dims = model
        .validate()
        .with_context(|| format!("invalid model in {}", args.model.display()))?;

    print_section(&format!("Model {}", args.model.display()));
    print_kv("State factors", &format!("{:?}", dims.states));
    print_kv("Outcome modalities", &format!("{:?}", dims.outcomes));
    print_kv("Control levels", &format!("{:?}", dims.controls));
    print_kv("Horizon", &dims.horizon.to_string());
    print_kv("Policies", &dims.policies.to_string());

    let learned: Vec<&str> = [
        ("a", model.likelihood_concentration.is_some()),
        ("b", model.transition_concentration.is_some()),
        ("d", model.initial_concentration.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, present)| present.then_some(name))
    .collect();
    print_kv(
        "Learned parameters",
        &if learned.is_empty() { "none".to_string() } else { learned.join(", ") },
    );
    print_kv("Moving policy", if model.moving_policy.is_some() { "yes" } else { "no" });
    Ok(())
}
