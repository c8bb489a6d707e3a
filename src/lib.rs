//! Active inference for discrete-state partially observable Markov decision processes
//!
//! This crate provides:
//! - Generative models with factorized hidden states and multiple outcome modalities
//! - Variational state estimation, expected free energy, and precision updates
//! - Action selection and Dirichlet learning of likelihood, transition, and initial-state parameters
//! - Observer and outcome-modulation ports, including nested inference
//! - JSON and CSV export of trajectory results

pub mod adapters;
pub mod algebra;
pub mod cli;
pub mod config;
pub mod efe;
pub mod error;
pub mod export;
pub mod inference;
pub mod model;
pub mod ports;
pub mod scenarios;
pub mod utils;

pub use config::InferenceOptions;
pub use error::{Error, Result};
pub use inference::{TrajectoryResult, TrajectoryRunner, run_trajectory};
pub use model::{GenerativeModel, ModelDims, MovingPolicy, Overrides, Policy, enumerate_policies};
pub use ports::{ModulationContext, OutcomeModulator, StepSummary, TrajectoryObserver};
