//! Expected free energy of policies and pruning of implausible ones.
//!
//! Scores are negative expected free energies: larger is better. Each future
//! time point contributes
//! - the expected information gain about hidden states (epistemic value)
//! - the expected log preference of predicted outcomes (risk)
//! - the expected information gain about likelihood parameters (novelty)
//!
//! plus, once per policy, the novelty of the initial-state parameters.

use ndarray::{Array2, ArrayView1};

use crate::{
    algebra::contract,
    efe::{predicted_outcome, state_information_gain},
    model::ModelStore,
};

/// Contributions to one policy's score, summed over time points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyScore {
    /// Expected information gain about hidden states
    pub epistemic: f64,
    /// Expected log preference of predicted outcomes
    pub extrinsic: f64,
    /// Expected information gain about likelihood and initial-state parameters
    pub novelty: f64,
}

impl PolicyScore {
    pub fn total(&self) -> f64 {
        self.epistemic + self.extrinsic + self.novelty
    }
}

/// Score the belief trajectory of one policy from time `t` to the horizon.
///
/// `beliefs[f]` has shape `(Ns(f), T)`.
pub fn score_policy(store: &ModelStore, beliefs: &[Array2<f64>], t: usize) -> PolicyScore {
    let mut score = PolicyScore::default();

    if let Some(initial_novelty) = &store.initial_novelty {
        for (w, x) in initial_novelty.iter().zip(beliefs) {
            score.novelty -= w.dot(&x.column(0));
        }
    }

    let horizon = beliefs.first().map_or(0, |x| x.ncols());
    for j in t..horizon {
        let states: Vec<ArrayView1<'_, f64>> = beliefs.iter().map(|x| x.column(j)).collect();
        score.epistemic += state_information_gain(&store.likelihood, &states);

        for (g, likelihood) in store.likelihood.iter().enumerate() {
            let outcomes = predicted_outcome(likelihood, &states);
            score.extrinsic += outcomes.dot(&store.log_preferences[g].column(j));

            if let Some(novelty) = &store.likelihood_novelty {
                let mut pairs = Vec::with_capacity(states.len() + 1);
                pairs.push((0, outcomes.view()));
                pairs.extend(states.iter().enumerate().map(|(f, x)| (f + 1, x.view())));
                let gain = contract(novelty[g].view(), &pairs);
                score.novelty -= gain.sum();
            }
        }
    }
    score
}

/// Indices of `live` policies whose free energy is within `threshold` nats of the best.
///
/// A policy exactly at the boundary is kept.
///
/// ```
/// use active_mdp::inference::prune_policies;
///
/// let kept = prune_policies(&[0, 1, 2, 3], &[-1.0, -2.0, -5.0, -10.0], 3.0);
/// assert_eq!(kept, vec![0, 1]);
/// ```
pub fn prune_policies(live: &[usize], free_energy: &[f64], threshold: f64) -> Vec<usize> {
    let best = live
        .iter()
        .map(|&k| free_energy[k])
        .fold(f64::NEG_INFINITY, f64::max);
    live.iter()
        .copied()
        .filter(|&k| free_energy[k] >= best - threshold)
        .collect()
}
