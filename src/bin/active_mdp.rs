//! active-mdp CLI - simulate discrete-state active inference agents
//!
//! This CLI provides a unified interface for:
//! - Simulating trajectories of JSON-defined generative models
//! - Running the built-in cue/reward demo
//! - Validating and inspecting model files

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "active-mdp")]
#[command(version, about = "Active inference for discrete-state POMDPs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one trajectory of a model file
    Simulate(active_mdp::cli::commands::simulate::SimulateArgs),

    /// Run the built-in cue/reward scenario
    Demo(active_mdp::cli::commands::demo::DemoArgs),

    /// Validate a model file and print its dimensions
    Inspect(active_mdp::cli::commands::inspect::InspectArgs),
}

fn init_logging() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = active_mdp::cli::log_filter(directives.as_deref());
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => active_mdp::cli::commands::simulate::execute(args),
        Commands::Demo(args) => active_mdp::cli::commands::demo::execute(args),
        Commands::Inspect(args) => active_mdp::cli::commands::inspect::execute(args),
    }
}
