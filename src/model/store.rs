//! Normalized working copies of a validated model.
//!
//! [`ModelStore`] holds what the agent believes (expectations of the
//! concentration parameters where present) and [`GenerativeProcess`] holds
//! what the world does (the true process tensors states and outcomes are
//! sampled from).

use ndarray::{Array1, Array2, Array3, ArrayD, Axis, IxDyn, s};
use rand::Rng;

use super::{GenerativeModel, ModelDims};
use crate::{
    Result,
    algebra::{back_normalize, contract, normalize, novelty_weights, safe_log},
    utils::{normalize_vector, sample_categorical, softmax},
};

/// Agent-side tensors used during inference.
#[derive(Debug, Clone)]
pub struct ModelStore {
    pub dims: ModelDims,
    /// Normalized likelihood per modality
    pub likelihood: Vec<ArrayD<f64>>,
    /// Normalized transitions per factor, `[next, previous, action]`
    pub transitions: Vec<Array3<f64>>,
    /// Row-normalized transitions for backward messages
    pub backward: Vec<Array3<f64>>,
    /// Log preferences per modality, one column per time step
    pub log_preferences: Vec<Array2<f64>>,
    /// Initial-state prior per factor
    pub initial_states: Vec<Array1<f64>>,
    /// Log policy prior
    pub log_policy_prior: Array1<f64>,
    /// Novelty weights of the likelihood concentration, if learned
    pub likelihood_novelty: Option<Vec<ArrayD<f64>>>,
    /// Novelty weights of the initial-state concentration, if learned
    pub initial_novelty: Option<Vec<Array1<f64>>>,
}

impl ModelStore {
    /// Validate `model` and derive the working tensors.
    pub fn new(model: &GenerativeModel) -> Result<Self> {
        let dims = model.validate()?;

        let likelihood: Vec<ArrayD<f64>> = match &model.likelihood_concentration {
            Some(a) => a.iter().map(normalize).collect(),
            None => model.likelihood.iter().map(normalize).collect(),
        };
        let transitions: Vec<Array3<f64>> = match &model.transition_concentration {
            Some(b) => b.iter().map(normalize).collect(),
            None => model.transitions.iter().map(normalize).collect(),
        };
        let backward = transitions.iter().map(back_normalize).collect();

        let log_preferences = (0..dims.modalities())
            .map(|g| log_preferences(model.preferences.get(g), dims.outcomes[g], dims.horizon))
            .collect();

        let initial_states = match &model.initial_concentration {
            Some(d) => d.iter().map(|v| normalize_vector(v.view())).collect(),
            None => prior_or_uniform(&model.initial_states, &dims.states),
        };

        let log_policy_prior = match &model.policy_prior {
            Some(e) => safe_log(&normalize_vector(e.view())),
            None => Array1::from_elem(dims.policies, -(dims.policies as f64).ln()),
        };

        let likelihood_novelty = model
            .likelihood_concentration
            .as_ref()
            .map(|a| a.iter().map(novelty_weights).collect());
        let initial_novelty = model
            .initial_concentration
            .as_ref()
            .map(|d| d.iter().map(novelty_weights).collect());

        Ok(Self {
            dims,
            likelihood,
            transitions,
            backward,
            log_preferences,
            initial_states,
            log_policy_prior,
            likelihood_novelty,
            initial_novelty,
        })
    }
}

/// Log-softmax every column of `C` and broadcast a static column across time.
fn log_preferences(preferences: Option<&Array2<f64>>, outcomes: usize, horizon: usize) -> Array2<f64> {
    let Some(c) = preferences else {
        return Array2::from_elem((outcomes, horizon), -(outcomes as f64).ln());
    };
    let static_column = c.ncols() == 1;
    let mut out = Array2::zeros((outcomes, horizon));
    for (t, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
        let source = c.column(if static_column { 0 } else { t });
        column.assign(&safe_log(&softmax(source)));
    }
    out
}

fn prior_or_uniform(priors: &[Array1<f64>], states: &[usize]) -> Vec<Array1<f64>> {
    states
        .iter()
        .enumerate()
        .map(|(f, &ns)| match priors.get(f) {
            Some(prior) => normalize_vector(prior.view()),
            None => Array1::from_elem(ns, 1.0 / ns as f64),
        })
        .collect()
}

/// True process tensors used to generate states and outcomes.
#[derive(Debug, Clone)]
pub struct GenerativeProcess {
    likelihood: Vec<ArrayD<f64>>,
    transitions: Vec<Array3<f64>>,
    initial_states: Vec<Array1<f64>>,
}

impl GenerativeProcess {
    pub fn new(model: &GenerativeModel, dims: &ModelDims) -> Self {
        let initial_states = if model.initial_states.is_empty() {
            match &model.initial_concentration {
                Some(d) => d.iter().map(|v| normalize_vector(v.view())).collect(),
                None => prior_or_uniform(&[], &dims.states),
            }
        } else {
            prior_or_uniform(&model.initial_states, &dims.states)
        };
        Self {
            likelihood: model.likelihood.iter().map(normalize).collect(),
            transitions: model.transitions.iter().map(normalize).collect(),
            initial_states,
        }
    }

    /// Sample the initial level of `factor`.
    pub fn sample_initial<R: Rng + ?Sized>(&self, rng: &mut R, factor: usize) -> usize {
        sample_categorical(rng, self.initial_states[factor].view())
    }

    /// Sample the next level of `factor` given its previous level and the action taken.
    pub fn sample_transition<R: Rng + ?Sized>(&self, rng: &mut R, factor: usize, previous: usize, action: usize) -> usize {
        let column = self.transitions[factor].slice(s![.., previous, action]);
        sample_categorical(rng, column)
    }

    /// Outcome distribution of `modality` under the joint hidden state.
    pub fn outcome_distribution(&self, modality: usize, states: &[usize]) -> Array1<f64> {
        let a = &self.likelihood[modality];
        let mut index = Vec::with_capacity(states.len() + 1);
        index.push(0);
        index.extend_from_slice(states);
        (0..a.len_of(Axis(0)))
            .map(|o| {
                index[0] = o;
                a[index.as_slice()]
            })
            .collect()
    }

    pub fn sample_outcome<R: Rng + ?Sized>(&self, rng: &mut R, modality: usize, states: &[usize]) -> usize {
        let distribution = self.outcome_distribution(modality, states);
        sample_categorical(rng, distribution.view())
    }
}

/// Likelihood of one time step's outcomes over joint hidden states:
/// `L[s] = Π_g Σ_o O_g[o] A_g[o, s]`.
pub(crate) fn joint_likelihood(likelihood: &[ArrayD<f64>], outcomes: &[Array1<f64>]) -> ArrayD<f64> {
    let mut joint: Option<ArrayD<f64>> = None;
    for (a, o) in likelihood.iter().zip(outcomes) {
        let evidence = contract(a.view(), &[(0, o.view())]);
        joint = Some(match joint {
            Some(acc) => acc * &evidence,
            None => evidence,
        });
    }
    joint.unwrap_or_else(|| ArrayD::ones(IxDyn(&[])))
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::model::Policy;

    fn model() -> GenerativeModel {
        let a = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 3.0 } else { 1.0 });
        let b = Array3::from_shape_fn((2, 2, 2), |(next, _, u)| if next == u { 1.0 } else { 0.0 });
        GenerativeModel::new(vec![a], vec![b], vec![Policy::new(vec![vec![0]]), Policy::new(vec![vec![1]])])
            .with_preferences(vec![array![[0.0], [2.0]]])
    }

    #[test]
    fn store_normalizes_likelihood_columns() {
        let store = ModelStore::new(&model()).unwrap();
        for column in store.likelihood[0].lanes(Axis(0)) {
            assert!((column.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn static_preferences_are_broadcast_and_log_normalized() {
        let store = ModelStore::new(&model()).unwrap();
        let c = &store.log_preferences[0];
        assert_eq!(c.dim(), (2, 2));
        for column in c.columns() {
            let total: f64 = column.iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        assert_eq!(c.column(0), c.column(1));
    }

    #[test]
    fn missing_priors_default_to_uniform() {
        let store = ModelStore::new(&model()).unwrap();
        assert_eq!(store.initial_states[0], array![0.5, 0.5]);
        assert!((store.log_policy_prior[0] - 0.5_f64.ln()).abs() < 1e-12);
        assert!(store.likelihood_novelty.is_none());
    }

    #[test]
    fn concentration_parameters_take_precedence() {
        let a = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == 0 { 1.0 } else { 0.0 });
        let store = ModelStore::new(&model().with_likelihood_concentration(vec![a])).unwrap();
        let column: Vec<f64> = store.likelihood[0].lanes(Axis(0)).into_iter().next().unwrap().to_vec();
        assert_eq!(column, vec![1.0, 0.0]);
        assert!(store.likelihood_novelty.is_some());
    }

    #[test]
    fn process_samples_deterministic_transitions() {
        let m = model();
        let dims = m.validate().unwrap();
        let process = GenerativeProcess::new(&m, &dims);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(process.sample_transition(&mut rng, 0, 0, 1), 1);
        }
    }

    #[test]
    fn joint_likelihood_multiplies_modalities() {
        let a0 = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 0.8 } else { 0.2 });
        let a1 = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 0.6 } else { 0.4 });
        let joint = joint_likelihood(&[a0, a1], &[array![1.0, 0.0], array![1.0, 0.0]]);
        let values: Vec<f64> = joint.iter().copied().collect();
        assert!((values[0] - 0.48).abs() < 1e-12);
        assert!((values[1] - 0.08).abs() < 1e-12);
    }
}
