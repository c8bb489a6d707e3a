//! Policies: sequences of joint actions over future time steps.

use serde::{Deserialize, Serialize};

/// One action per controllable factor at each future step, indexed `[step][factor]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy {
    steps: Vec<Vec<usize>>,
}

impl Policy {
    pub fn new(steps: Vec<Vec<usize>>) -> Self {
        Self { steps }
    }

    /// Repeat the same joint action for `len` steps.
    pub fn constant(action: &[usize], len: usize) -> Self {
        Self {
            steps: vec![action.to_vec(); len],
        }
    }

    /// Action prescribed for `factor` at `step`.
    pub fn action(&self, step: usize, factor: usize) -> usize {
        self.steps[step][factor]
    }

    /// Joint action prescribed at `step`.
    pub fn joint_action(&self, step: usize) -> &[usize] {
        &self.steps[step]
    }

    pub fn steps(&self) -> &[Vec<usize>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn set_joint_action(&mut self, step: usize, action: &[usize]) {
        if let Some(slot) = self.steps.get_mut(step) {
            slot.clear();
            slot.extend_from_slice(action);
        }
    }
}

/// Enumerate every sequence of joint actions over `horizon - 1` steps.
///
/// Factors with a single control level contribute action 0 throughout.
///
/// ```
/// use active_mdp::model::enumerate_policies;
///
/// let policies = enumerate_policies(&[2, 1], 3);
/// assert_eq!(policies.len(), 4);
/// assert_eq!(policies[3].joint_action(1), &[1, 0]);
/// ```
pub fn enumerate_policies(controls: &[usize], horizon: usize) -> Vec<Policy> {
    let joint_actions = enumerate_joint_actions(controls);
    let steps = horizon.saturating_sub(1);

    let mut sequences: Vec<Vec<Vec<usize>>> = vec![Vec::new()];
    for _ in 0..steps {
        sequences = sequences
            .into_iter()
            .flat_map(|prefix| {
                joint_actions.iter().map(move |action| {
                    let mut next = prefix.clone();
                    next.push(action.clone());
                    next
                })
            })
            .collect();
    }
    sequences.into_iter().map(Policy::new).collect()
}

/// Every joint action in row-major order (last factor varies fastest).
pub fn enumerate_joint_actions(controls: &[usize]) -> Vec<Vec<usize>> {
    let mut actions: Vec<Vec<usize>> = vec![Vec::new()];
    for &levels in controls {
        actions = actions
            .into_iter()
            .flat_map(|prefix| {
                (0..levels.max(1)).map(move |u| {
                    let mut next = prefix.clone();
                    next.push(u);
                    next
                })
            })
            .collect();
    }
    actions
}

/// Moving-policy mode: only the next action is open, later steps follow a default.
///
/// Each candidate policy takes one repertoire entry as its next action and the
/// default action afterwards. After every selection the policy set is rewritten
/// so that the realized action occupies the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingPolicy {
    /// Allowable joint actions, one candidate policy each
    pub repertoire: Vec<Vec<usize>>,
    /// Joint action assumed for all steps beyond the next one
    pub default_action: Vec<usize>,
}

impl MovingPolicy {
    pub fn new(repertoire: Vec<Vec<usize>>, default_action: Vec<usize>) -> Self {
        Self {
            repertoire,
            default_action,
        }
    }

    /// Candidate policies before any action has been taken.
    pub fn initial_policies(&self, horizon: usize) -> Vec<Policy> {
        let steps = horizon.saturating_sub(1);
        self.repertoire
            .iter()
            .map(|next| {
                let mut policy = Policy::constant(&self.default_action, steps);
                policy.set_joint_action(0, next);
                policy
            })
            .collect()
    }

    /// Rewrite the policy set after `selected` was taken at step `t`.
    pub fn advance(&self, policies: &mut [Policy], t: usize, selected: &[usize]) {
        for (policy, next) in policies.iter_mut().zip(&self.repertoire) {
            policy.set_joint_action(t, selected);
            policy.set_joint_action(t + 1, next);
            for step in t + 2..policy.len() {
                policy.set_joint_action(step, &self.default_action);
            }
        }
    }
}
