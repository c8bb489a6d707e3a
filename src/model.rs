//! Generative model definitions for discrete-state active inference
//!
//! A model describes the problem: likelihood tensors A, transition kernels B,
//! preferences C, the initial-state prior D, the policy prior E, the policy set,
//! and optional Dirichlet concentration counterparts a, b, d. The
//! [`ModelStore`] derives the normalized working copies the inference uses.
//!
//! ## Module Structure
//!
//! - [`generative_model`]: Serializable model definition and validation
//! - [`policies`]: Policies, enumeration, and the moving-policy repertoire
//! - [`store`]: Normalized working tensors derived from a model

pub mod generative_model;
pub mod policies;
pub mod store;

pub use generative_model::{GenerativeModel, ModelDims, Overrides};
pub use policies::{MovingPolicy, Policy, enumerate_policies};
pub use store::{GenerativeProcess, ModelStore};
