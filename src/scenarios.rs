//! Ready-made generative models for demos and tests.

use ndarray::{Array1, Array2, Array3, ArrayD, IxDyn, array};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Gamma};

use crate::{
    Error, Result,
    model::{GenerativeModel, Policy, enumerate_policies},
};

/// Location levels of the cue/reward maze.
pub const START: usize = 0;
pub const CUE: usize = 1;
pub const LEFT_ARM: usize = 2;
pub const RIGHT_ARM: usize = 3;

/// Probability that the better arm pays out.
pub const REWARD_VALIDITY: f64 = 0.9;

/// Two-armed maze with an informative cue.
///
/// Hidden-state factors:
/// - location (start, cue, left arm, right arm), controlled by 4 actions that
///   move to the named location; both arms are absorbing
/// - context (left arm better, right arm better), not controllable
///
/// Outcome modalities:
/// - where: the current location
/// - cue: nothing, "left", or "right"; informative only at the cue location
/// - reward: nothing, reward, or loss; the better arm rewards with
///   probability [`REWARD_VALIDITY`]
///
/// The agent prefers reward (+3) and avoids loss (-3). Five policies over two
/// moves: stay, go left, go right, cue then left, cue then right. The agent
/// learns its likelihood and initial-state beliefs.
pub fn cue_reward_model() -> GenerativeModel {
    let where_likelihood = ArrayD::from_shape_fn(IxDyn(&[4, 4, 2]), |ix| if ix[0] == ix[1] { 1.0 } else { 0.0 });
    let cue_likelihood = ArrayD::from_shape_fn(IxDyn(&[3, 4, 2]), |ix| {
        let (outcome, location, context) = (ix[0], ix[1], ix[2]);
        let expected = if location == CUE { 1 + context } else { 0 };
        if outcome == expected { 1.0 } else { 0.0 }
    });
    let reward_likelihood = ArrayD::from_shape_fn(IxDyn(&[3, 4, 2]), |ix| {
        let (outcome, location, context) = (ix[0], ix[1], ix[2]);
        let better = match location {
            LEFT_ARM => context == 0,
            RIGHT_ARM => context == 1,
            _ => return if outcome == 0 { 1.0 } else { 0.0 },
        };
        let reward = if better { REWARD_VALIDITY } else { 1.0 - REWARD_VALIDITY };
        match outcome {
            1 => reward,
            2 => 1.0 - reward,
            _ => 0.0,
        }
    });
    let likelihood = vec![where_likelihood, cue_likelihood, reward_likelihood];

    let location = Array3::from_shape_fn((4, 4, 4), |(next, previous, u)| {
        let target = if previous == LEFT_ARM || previous == RIGHT_ARM { previous } else { u };
        if next == target { 1.0 } else { 0.0 }
    });
    let context = Array3::from_shape_fn((2, 2, 1), |(next, previous, _)| if next == previous { 1.0 } else { 0.0 });

    let preferences = vec![Array2::zeros((4, 1)), Array2::zeros((3, 1)), array![[0.0], [3.0], [-3.0]]];

    let policies = [[START, START], [LEFT_ARM, LEFT_ARM], [RIGHT_ARM, RIGHT_ARM], [CUE, LEFT_ARM], [CUE, RIGHT_ARM]]
        .iter()
        .map(|moves| Policy::new(moves.iter().map(|&m| vec![m, 0]).collect()))
        .collect();

    let likelihood_concentration = likelihood.iter().map(|a| a.mapv(|p| p * 8.0)).collect();

    GenerativeModel::new(likelihood, vec![location, context], policies)
        .with_preferences(preferences)
        .with_initial_states(vec![array![1.0, 0.0, 0.0, 0.0], array![0.5, 0.5]])
        .with_horizon(3)
        .with_likelihood_concentration(likelihood_concentration)
        .with_initial_concentration(vec![array![1.0, 0.0, 0.0, 0.0], array![0.25, 0.25]])
}

/// A model with random Dirichlet(1) likelihoods and transitions.
///
/// Every column of every tensor is an independent draw; all policies over
/// `horizon - 1` steps are enumerated. Deterministic for a given seed.
pub fn random_model(seed: u64, states: &[usize], outcomes: &[usize], controls: &[usize], horizon: usize) -> Result<GenerativeModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let gamma = Gamma::new(1.0, 1.0).map_err(|_| Error::InvalidHyperparameter {
        name: "gamma shape".to_string(),
        value: 1.0,
    })?;
    let mut draw = |shape: &[usize]| -> ArrayD<f64> {
        let raw = ArrayD::from_shape_fn(IxDyn(shape), |_| gamma.sample(&mut rng));
        crate::algebra::normalize(&raw)
    };

    let likelihood = outcomes
        .iter()
        .map(|&no| {
            let mut shape = vec![no];
            shape.extend_from_slice(states);
            draw(&shape)
        })
        .collect();
    let transitions = states
        .iter()
        .zip(controls)
        .map(|(&ns, &nu)| {
            draw(&[ns, ns, nu])
                .into_dimensionality()
                .map_err(|_| Error::shape("transitions", format!("({ns}, {ns}, {nu})"), "random draw"))
        })
        .collect::<Result<Vec<Array3<f64>>>>()?;
    let initial_states = states.iter().map(|&ns| Array1::from_elem(ns, 1.0 / ns as f64)).collect();

    Ok(GenerativeModel::new(likelihood, transitions, enumerate_policies(controls, horizon))
        .with_initial_states(initial_states)
        .with_horizon(horizon))
}
