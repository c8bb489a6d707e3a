//! End-to-end trajectories of the built-in and fixture models

mod common;

use std::sync::{Arc, Mutex};

use active_mdp::{
    Error, InferenceOptions, ModulationContext, MovingPolicy, OutcomeModulator, Overrides, TrajectoryRunner,
    adapters::{LoggingObserver, NestedInference, NestedInferenceConfig, ProgressObserver, nested_step},
    run_trajectory,
    scenarios::{CUE, START, cue_reward_model, random_model},
};
use common::{RecordingObserver, assert_distribution, certain_start_model, seeded};
use ndarray::{Array1, Axis, array};

#[test]
fn cue_reward_trajectory_has_consistent_shapes() {
    let result = run_trajectory(&cue_reward_model(), &seeded(11)).unwrap();

    assert_eq!(result.steps, 3);
    assert_eq!(result.states.len(), 2);
    assert!(result.states.iter().all(|row| row.len() == 3));
    assert_eq!(result.outcomes.len(), 3);
    assert!(result.actions.iter().all(|row| row.len() == 2));
    assert_eq!(result.action_probabilities.len(), 2);
    assert_eq!(result.precision.len(), 16 * 3);
    assert_eq!(result.phasic_precision.len(), result.precision.len());
    assert_eq!(result.policy_posterior_trace.dim(), (5, 16 * 3));
    assert_eq!(result.policy_beliefs[0].dim(), (4, 3, 5));
    assert_eq!(result.belief_trace[1].dim(), (16, 2, 3, 3, 5));

    assert_eq!(result.states[0][0], START, "the maze always starts at the start");
    for t in 0..3 {
        assert_eq!(result.outcomes[0][t], result.states[0][t], "location is observed directly");
    }
}

#[test]
fn beliefs_and_posteriors_are_distributions() {
    let result = run_trajectory(&cue_reward_model(), &seeded(5)).unwrap();

    for (f, averaged) in result.averaged_beliefs.iter().enumerate() {
        for column in averaged.columns() {
            assert_distribution(column, &format!("averaged factor {f}"));
        }
    }
    for beliefs in &result.policy_beliefs {
        for lane in beliefs.lanes(Axis(0)) {
            assert_distribution(lane, "policy beliefs");
        }
    }
    for t in 0..result.steps {
        assert_distribution(result.policy_posterior.column(t), &format!("policy posterior at {t}"));
    }
    for probabilities in &result.action_probabilities {
        assert!((probabilities.sum() - 1.0).abs() < 1e-9);
    }
    assert!(result.precision.iter().all(|&g| g > 0.0));
}

#[test]
fn same_seed_reproduces_the_trajectory() {
    let model = cue_reward_model();
    let first = run_trajectory(&model, &seeded(99)).unwrap();
    let second = run_trajectory(&model, &seeded(99)).unwrap();

    assert_eq!(first.states, second.states);
    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(first.actions, second.actions);
    assert_eq!(first.precision, second.precision);
}

#[test]
fn learning_grows_concentrations_and_reports_complexity() {
    let model = cue_reward_model();
    let result = run_trajectory(&model, &seeded(3)).unwrap();
    let learned = result.learned.expect("learning is on by default");

    let prior = model.likelihood_concentration.as_ref().unwrap();
    let posterior = learned.likelihood.unwrap();
    for (q, p) in posterior.iter().zip(prior) {
        assert!(q.sum() > p.sum());
        assert!(q.iter().zip(p.iter()).all(|(&q, &p)| if p == 0.0 { q == 0.0 } else { q >= p }));
    }
    assert!(learned.transitions.is_none(), "the maze has no transition concentrations");

    let d = learned.initial_states.unwrap();
    assert!((d[0][START] - 2.0).abs() < 1e-9, "location prior gains one count at the start");
    assert_eq!(d[0][CUE], 0.0);

    assert_eq!(learned.complexity.likelihood.len(), 3);
    assert!(learned.complexity.likelihood.iter().all(|kl| kl.is_finite()));
}

#[test]
fn learning_can_be_disabled() {
    let result = run_trajectory(&cue_reward_model(), &seeded(3).with_learning(false)).unwrap();
    assert!(result.learned.is_none());
}

#[test]
fn random_models_run_end_to_end() {
    for seed in 0..4 {
        let model = random_model(seed, &[3, 2], &[3, 2], &[2, 1], 3).unwrap();
        let result = run_trajectory(&model, &seeded(seed)).unwrap();
        assert_eq!(result.steps, 3);
        for averaged in &result.averaged_beliefs {
            for column in averaged.columns() {
                assert_distribution(column, &format!("random model {seed}"));
            }
        }
    }
}

#[test]
fn moving_policy_rewrites_the_policy_set() {
    let repertoire = (0..4).map(|u| vec![u, 0]).collect();
    let model = cue_reward_model().with_moving_policy(MovingPolicy::new(repertoire, vec![START, 0]));
    let result = run_trajectory(&model, &seeded(8)).unwrap();

    assert_eq!(result.policies.len(), 4);
    let first = result.action_at(0).unwrap();
    for policy in &result.policies {
        assert_eq!(policy.joint_action(0), first.as_slice());
    }
    assert!(
        result.precision.iter().all(|&g| (g - 1.0).abs() < 1e-12),
        "precision is held at 1/beta in moving mode"
    );
}

#[test]
fn early_termination_stops_once_the_start_is_known() {
    let model = certain_start_model();
    let stopped = run_trajectory(&model, &seeded(1).with_early_termination(true)).unwrap();
    assert_eq!(stopped.steps, 1);
    assert!(stopped.actions.iter().all(Vec::is_empty));

    let full = run_trajectory(&model, &seeded(1)).unwrap();
    assert_eq!(full.steps, 3);
}

#[test]
fn overrides_fix_states_and_actions() {
    let overrides = Overrides {
        states: vec![vec![], vec![Some(1)]],
        outcomes: vec![],
        actions: vec![vec![Some(CUE)]],
    };
    let model = cue_reward_model().with_overrides(overrides);

    for seed in 0..5 {
        let result = run_trajectory(&model, &seeded(seed)).unwrap();
        assert_eq!(result.states[1][0], 1);
        assert_eq!(result.actions[0][0], CUE);
        assert_eq!(result.states[0][1], CUE);
        assert_eq!(result.outcomes[1][1], 2, "the cue reports the right-arm context");
    }
}

#[test]
fn invalid_overrides_are_rejected() {
    let overrides = Overrides {
        actions: vec![vec![Some(9)]],
        ..Overrides::default()
    };
    let model = cue_reward_model().with_overrides(overrides);
    assert!(run_trajectory(&model, &seeded(0)).is_err());
}

#[test]
fn invalid_options_are_rejected() {
    let options = InferenceOptions::default().with_beta(0.0);
    let err = run_trajectory(&cue_reward_model(), &options).unwrap_err();
    assert!(matches!(err, Error::InvalidHyperparameter { .. }));
}

#[test]
fn observers_see_every_step() {
    let recorder = RecordingObserver::default();
    let recording = Arc::clone(&recorder.recording);
    let model = cue_reward_model();

    let result = TrajectoryRunner::new(&model, seeded(4))
        .with_observer(Box::new(recorder))
        .with_observer(Box::new(LoggingObserver))
        .with_observer(Box::new(ProgressObserver::hidden()))
        .run()
        .unwrap();

    let recording = recording.lock().unwrap();
    assert_eq!(recording.started.as_ref().map(|d| d.horizon), Some(3));
    assert_eq!(recording.steps, vec![0, 1, 2]);
    assert!(recording.actions[0].is_some());
    assert!(recording.actions[2].is_none(), "no action after the last outcome");
    assert_eq!(recording.actions[0], result.action_at(0));
    assert_eq!(recording.finished_steps, Some(3));
}

/// Replaces the cue modality with a flat distribution and counts its calls.
struct FlattenCue {
    calls: Arc<Mutex<usize>>,
}

impl OutcomeModulator for FlattenCue {
    fn modulate(&mut self, context: &ModulationContext<'_>) -> active_mdp::Result<Vec<(usize, Array1<f64>)>> {
        *self.calls.lock().unwrap() += 1;
        assert_eq!(context.predicted.len(), 3);
        Ok(vec![(1, array![2.0, 2.0, 2.0])])
    }
}

#[test]
fn modulator_replaces_outcome_distributions() {
    let calls = Arc::new(Mutex::new(0));
    let model = cue_reward_model();
    let result = TrajectoryRunner::new(&model, seeded(6))
        .with_modulator(Box::new(FlattenCue {
            calls: Arc::clone(&calls),
        }))
        .run()
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), 3);
    for distribution in &result.outcome_distributions[1] {
        assert!(distribution.iter().all(|&p| (p - 1.0 / 3.0).abs() < 1e-12));
    }
    for distribution in &result.outcome_distributions[0] {
        assert_eq!(distribution.sum(), 1.0);
        assert_eq!(distribution.iter().filter(|&&p| p == 1.0).count(), 1);
    }
}

#[test]
fn likelihood_learning_counts_realized_outcomes_not_modulated_evidence() {
    let model = cue_reward_model();
    let result = TrajectoryRunner::new(&model, seeded(6))
        .with_modulator(Box::new(FlattenCue {
            calls: Arc::new(Mutex::new(0)),
        }))
        .run()
        .unwrap();

    let prior = &model.likelihood_concentration.as_ref().unwrap()[1];
    let posterior = &result.learned.unwrap().likelihood.unwrap()[1];
    let unseen: Vec<usize> = (0..3).filter(|o| !result.outcomes[1].contains(o)).collect();
    assert!(!unseen.is_empty(), "only one context's cue can be observed in a trial");
    for o in unseen {
        assert_eq!(posterior.index_axis(Axis(0), o), prior.index_axis(Axis(0), o));
    }
}

fn nested_config() -> NestedInferenceConfig {
    NestedInferenceConfig {
        prior_modality: 0,
        prior_factor: 0,
        precision_modality: 1,
        beta_range: (0.5, 2.0),
        state_modality: 0,
        state_factor: 0,
        targets: vec![1],
        reference_precision: 1.0,
        ..NestedInferenceConfig::default()
    }
}

#[test]
fn nested_step_builds_the_child_from_parent_predictions() {
    let child = cue_reward_model();
    let options = seeded(1).with_learning(false);
    let predicted = vec![array![0.7, 0.1, 0.1, 0.1], array![0.25, 0.75]];
    let outcomes = [CUE, 1];
    let context = ModulationContext {
        t: 0,
        states: &[],
        outcomes: &outcomes,
        predicted: &predicted,
        precision: 1.0,
    };

    let step = nested_step(&child, &options, &nested_config(), &context).unwrap();
    assert!((step.child_beta - (0.25 * 0.5 + 0.75 * 2.0)).abs() < 1e-12);
    assert_eq!(step.child.states[0][0], CUE, "child starts where the parent observed");
    assert!(step.exponent >= 0.03);
    assert_eq!(step.replacements.len(), 1);
    assert_eq!(step.replacements[0].0, 1);
    assert_distribution(step.replacements[0].1.view(), "reweighted outcome");
}

#[test]
fn nested_inference_modulates_a_parent_trajectory() {
    let parent = random_model(17, &[4], &[4, 2], &[2], 2).unwrap();
    let nested = NestedInference::new(cue_reward_model(), seeded(2).with_learning(false), nested_config()).unwrap();

    let result = TrajectoryRunner::new(&parent, seeded(17))
        .with_modulator(Box::new(nested))
        .run()
        .unwrap();

    assert_eq!(result.steps, 2);
    for distribution in &result.outcome_distributions[1] {
        assert_distribution(distribution.view(), "modulated outcome");
    }
}

#[test]
fn nested_inference_needs_initial_concentrations() {
    let mut child = cue_reward_model();
    child.initial_concentration = None;
    assert!(NestedInference::new(child, seeded(0), nested_config()).is_err());
}
