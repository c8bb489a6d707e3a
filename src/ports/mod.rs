//! Ports (trait boundaries) for collaborators of the inference loop.
//!
//! These traits are owned by the engine and implemented by adapters, so the
//! trajectory runner never depends on a concrete observer or modulator.

pub mod modulator;
pub mod observer;

pub use modulator::{ModulationContext, OutcomeModulator};
pub use observer::{StepSummary, TrajectoryObserver};
