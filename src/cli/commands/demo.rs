//! Demo command - the built-in cue/reward maze
//!
//! Runs several trials in a row; with learning enabled, the concentration
//! parameters learned in one trial become the priors of the next.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use super::{InferenceArgs, OutputArgs, run_and_report};
use crate::scenarios::cue_reward_model;

#[derive(Parser, Debug)]
#[command(about = "Run the built-in cue/reward scenario")]
pub struct DemoArgs {
    /// Number of consecutive trials
    #[arg(long, short = 'n', default_value_t = 1)]
    pub trials: usize,

    #[command(flatten)]
    pub inference: InferenceArgs,

    /// Outputs describe the last trial
    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn execute(args: DemoArgs) -> Result<()> {
    let mut model = cue_reward_model();
    let trials = args.trials.max(1);

    for trial in 0..trials {
        let mut inference = args.inference.clone();
        inference.seed = args.inference.seed.map(|seed| seed.wrapping_add(trial as u64));
        let output = if trial + 1 == trials { args.output.clone() } else { Default::default() };

        let title = format!("Cue/reward trial {}/{}", trial + 1, trials);
        let result = run_and_report(&title, &model, &inference, &output)?;

        if let Some(learned) = result.learned {
            if let Some(a) = learned.likelihood {
                model.likelihood_concentration = Some(a);
            }
            if let Some(b) = learned.transitions {
                model.transition_concentration = Some(b);
            }
            if let Some(d) = learned.initial_states {
                model.initial_concentration = Some(d);
            }
            info!(trial, "carrying learned concentrations into the next trial");
        }
    }
    Ok(())
}
