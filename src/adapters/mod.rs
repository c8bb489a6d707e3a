//! Adapters implementing domain ports.
//!
//! This module contains infrastructure implementations of the traits defined
//! in the ports module. Adapters depend on the ports, not the other way
//! around.

pub mod logging_observer;
pub mod nested_inference;
pub mod progress_observer;

pub use logging_observer::LoggingObserver;
pub use nested_inference::{NestedInference, NestedInferenceConfig, NestedStep, nested_step};
pub use progress_observer::ProgressObserver;
