//! Variational inference and decision loop for discrete-state POMDPs
//!
//! Each time step runs the same pipeline: beliefs about hidden states are
//! refined for every live policy, policies are scored by expected free energy
//! and pruned, precision and the policy posterior are updated together, the
//! beliefs are averaged over policies, and an action is drawn. Concentration
//! parameters are learned once the trajectory is complete.
//!
//! ## Module Structure
//!
//! - [`state_estimation`]: Fixed-point belief updates per policy
//! - [`policy_evaluation`]: Expected free energy and policy pruning
//! - [`precision`]: Precision and policy posterior updates
//! - [`action`]: Joint action marginals, sharpening, and sampling
//! - [`learning`]: Dirichlet concentration-parameter updates
//! - [`trajectory`]: The per-trajectory loop and its runner
//! - [`result`]: Trajectory outputs and persistence

pub mod action;
pub mod learning;
pub mod policy_evaluation;
pub mod precision;
pub mod result;
pub mod state_estimation;
pub mod trajectory;

pub use action::{action_marginal, select_action, sharpen_actions};
pub use learning::{learn_initial_states, learn_likelihood, learn_transitions};
pub use policy_evaluation::{PolicyScore, prune_policies, score_policy};
pub use precision::{PrecisionState, PrecisionUpdate, update_precision};
pub use result::{Complexity, LearnedParameters, TrajectoryResult};
pub use state_estimation::{EstimationSettings, EstimationTrace, anneal, estimate_states, initial_beliefs};
pub use trajectory::{TrajectoryRunner, run_trajectory};
