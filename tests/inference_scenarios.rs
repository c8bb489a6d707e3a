//! Worked scenarios for the individual inference stages

mod common;

use active_mdp::inference::{
    PrecisionState, learn_likelihood, prune_policies, select_action, sharpen_actions, update_precision,
};
use common::TOLERANCE;
use ndarray::{ArrayD, IxDyn, array};
use rand::{SeedableRng, rngs::StdRng};

#[test]
fn pruning_keeps_policies_on_the_boundary() {
    let live = [0, 1, 2, 3];
    assert_eq!(prune_policies(&live, &[-1.0, -2.0, -5.0, -10.0], 3.0), vec![0, 1]);
    assert_eq!(prune_policies(&live, &[-1.0, -2.0, -4.0, -10.0], 3.0), vec![0, 1, 2]);
}

#[test]
fn pruning_only_considers_live_policies() {
    // Policy 0 is already gone; its stale free energy must not set the bar.
    let kept = prune_policies(&[1, 2, 3], &[100.0, -1.0, -3.5, -4.5], 3.0);
    assert_eq!(kept, vec![1, 2]);
}

#[test]
fn precision_step_moves_toward_higher_score() {
    let mut state = PrecisionState::new(1.0);
    let log_prior = array![0.5_f64.ln(), 0.5_f64.ln()];
    let update = update_precision(
        &mut state,
        log_prior.view(),
        array![0.5, -0.3].view(),
        array![0.0, 0.0].view(),
        1,
        false,
    );

    assert!(update.posterior[0] > 0.5);
    assert!((update.posterior.sum() - 1.0).abs() < TOLERANCE);
    assert!(state.precision() > 0.0);
}

#[test]
fn precision_stays_positive_under_conflicting_evidence() {
    let mut state = PrecisionState::new(1.0);
    let log_prior = array![0.5_f64.ln(), 0.5_f64.ln()];
    let update = update_precision(
        &mut state,
        log_prior.view(),
        array![8.0, -8.0].view(),
        array![-30.0, 0.0].view(),
        64,
        false,
    );
    assert!(update.precision_trace.iter().all(|&g| g > 0.0 && g.is_finite()));
}

#[test]
fn fixed_precision_holds_prior_value() {
    let mut state = PrecisionState::new(2.0);
    let log_prior = array![0.5_f64.ln(), 0.5_f64.ln()];
    let update = update_precision(
        &mut state,
        log_prior.view(),
        array![1.0, -1.0].view(),
        array![0.0, -2.0].view(),
        16,
        true,
    );
    assert!(update.precision_trace.iter().all(|&g| (g - 0.5).abs() < TOLERANCE));
}

#[test]
fn sharpened_actions_concentrate_on_the_largest_cell() {
    let marginal = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.1, 0.4, 0.2, 0.3]).unwrap();
    let probabilities = sharpen_actions(&marginal, 16.0);
    assert!(probabilities[IxDyn(&[0, 1])] > 0.98);
    assert!((probabilities.sum() - 1.0).abs() < TOLERANCE);

    let mut rng = StdRng::seed_from_u64(2024);
    let draws = 2000;
    let hits = (0..draws)
        .filter(|_| select_action(&mut rng, &probabilities, &[None, None]) == vec![0, 1])
        .count();
    assert!(hits as f64 / draws as f64 > 0.95, "only {hits} of {draws} draws hit the mode");
}

#[test]
fn action_overrides_replace_sampled_entries() {
    let marginal = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.1, 0.4, 0.2, 0.3]).unwrap();
    let probabilities = sharpen_actions(&marginal, 16.0);
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..20 {
        let action = select_action(&mut rng, &probabilities, &[Some(1), None]);
        assert_eq!(action[0], 1);
    }
}

#[test]
fn likelihood_learning_follows_state_beliefs() {
    let mut a = vec![ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 1.0, 1.0, 1.0]).unwrap()];
    let outcomes = vec![vec![array![1.0, 0.0]]];
    let averaged = vec![array![[0.9], [0.1]]];
    learn_likelihood(&mut a, &outcomes, &averaged, 1.0);

    assert!((a[0][IxDyn(&[0, 0])] - 1.9).abs() < TOLERANCE);
    assert!((a[0][IxDyn(&[0, 1])] - 1.1).abs() < TOLERANCE);
    assert_eq!(a[0][IxDyn(&[1, 0])], 1.0);
    assert_eq!(a[0][IxDyn(&[1, 1])], 1.0);
}
