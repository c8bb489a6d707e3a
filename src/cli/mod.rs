//! CLI infrastructure for the active inference engine
//!
//! This module provides the command-line interface for simulating
//! trajectories of JSON-defined models, running the built-in demo, and
//! inspecting model files.

pub mod commands;
pub mod output;

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset, empty, or unparsable.
pub const DEFAULT_LOG_DIRECTIVE: &str = "active_mdp=info";

/// Log filter from the user's directives, falling back to [`DEFAULT_LOG_DIRECTIVE`].
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    match directives.filter(|d| !d.trim().is_empty()).map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        _ => EnvFilter::new(DEFAULT_LOG_DIRECTIVE),
    }
}
