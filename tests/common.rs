//! Common test utilities for the active-mdp test suite.
//!
//! This module provides small fixture models, a recording observer, and
//! tolerance helpers used across multiple tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use active_mdp::{
    GenerativeModel, InferenceOptions, Policy, Result, StepSummary, TrajectoryObserver, TrajectoryResult,
    model::ModelDims,
};
use ndarray::{Array3, ArrayD, ArrayView1, IxDyn, array};

/// Default tolerance for probability sums.
pub const TOLERANCE: f64 = 1e-9;

/// Options with a fixed seed and otherwise default hyperparameters.
pub fn seeded(seed: u64) -> InferenceOptions {
    InferenceOptions::default().with_seed(seed)
}

/// One factor with two states, one identity modality, and a known initial state.
///
/// Two actions (stay, switch) over a horizon of three. No uncertainty remains
/// about the initial state once the first outcome is seen.
pub fn certain_start_model() -> GenerativeModel {
    let likelihood = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 1.0 } else { 0.0 });
    let transitions = Array3::from_shape_fn((2, 2, 2), |(next, previous, u)| {
        let target = if u == 0 { previous } else { 1 - previous };
        if next == target { 1.0 } else { 0.0 }
    });
    let policies = vec![
        Policy::new(vec![vec![0], vec![0]]),
        Policy::new(vec![vec![1], vec![0]]),
        Policy::new(vec![vec![1], vec![1]]),
    ];
    GenerativeModel::new(vec![likelihood], vec![transitions], policies)
        .with_preferences(vec![array![[0.0], [2.0]]])
        .with_initial_states(vec![array![1.0, 0.0]])
}

/// Assert that a vector is a probability distribution.
pub fn assert_distribution(values: ArrayView1<'_, f64>, context: &str) {
    assert!(values.iter().all(|&p| p >= 0.0), "{context}: negative entry in {values}");
    let total = values.sum();
    assert!((total - 1.0).abs() < TOLERANCE, "{context}: sums to {total}");
}

/// Events seen by a [`RecordingObserver`].
#[derive(Debug, Default, Clone)]
pub struct Recording {
    pub started: Option<ModelDims>,
    pub steps: Vec<usize>,
    pub actions: Vec<Option<Vec<usize>>>,
    pub finished_steps: Option<usize>,
}

/// Observer that copies every event into shared storage.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub recording: Arc<Mutex<Recording>>,
}

impl TrajectoryObserver for RecordingObserver {
    fn on_trajectory_start(&mut self, dims: &ModelDims) -> Result<()> {
        self.recording.lock().unwrap().started = Some(dims.clone());
        Ok(())
    }

    fn on_step(&mut self, summary: &StepSummary<'_>) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        recording.steps.push(summary.t);
        recording.actions.push(summary.action.map(<[usize]>::to_vec));
        Ok(())
    }

    fn on_trajectory_end(&mut self, result: &TrajectoryResult) -> Result<()> {
        self.recording.lock().unwrap().finished_steps = Some(result.steps);
        Ok(())
    }
}
