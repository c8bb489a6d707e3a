//! Variational state estimation for one policy.
//!
//! Beliefs about every hidden-state factor at every time point of the
//! trajectory are refined by a damped gradient descent on variational free
//! energy. Messages come from three places: the evidence of outcomes already
//! observed, the forward prediction from the previous time point (or the
//! initial-state prior), and the backward prediction from the next time point.

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView1, s};

use crate::{
    algebra::{marginal_vector, safe_log},
    model::{ModelStore, Policy},
    utils::softmax,
};

/// Iteration settings for [`estimate_states`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationSettings {
    /// Number of sweeps over the trajectory
    pub iterations: usize,
    /// Time constant of the belief update
    pub tau: f64,
}

/// Outcome of one call to [`estimate_states`].
#[derive(Debug, Clone)]
pub struct EstimationTrace {
    /// Negative free energy after the last sweep
    pub free_energy: f64,
    /// Negative free energy after every sweep
    pub history: Vec<f64>,
    /// Belief after every sweep, per factor `(iteration, level, time)`
    pub beliefs: Vec<Array3<f64>>,
    /// Mean-centred gradient after every sweep, per factor `(iteration, level, time)`
    pub gradients: Vec<Array3<f64>>,
    /// Sweep after which the beliefs stopped moving, if they did
    pub frozen_at: Option<usize>,
}

/// Initial belief trajectory for one policy: the prior at time 0, uniform later.
pub fn initial_beliefs(store: &ModelStore) -> Vec<Array2<f64>> {
    let horizon = store.dims.horizon;
    store
        .initial_states
        .iter()
        .map(|prior| {
            let ns = prior.len();
            let mut beliefs = Array2::from_elem((ns, horizon), 1.0 / ns as f64);
            beliefs.column_mut(0).assign(prior);
            beliefs
        })
        .collect()
}

/// Flatten every belief toward uniform: `softmax(log(x) / exponent)` per column.
pub fn anneal(beliefs: &mut [Array2<f64>], exponent: f64) {
    for factor in beliefs.iter_mut() {
        for mut column in factor.columns_mut() {
            let tempered = safe_log(&column) / exponent;
            column.assign(&softmax(tempered.view()));
        }
    }
}

/// Refine the belief trajectory of one policy in place.
///
/// `beliefs[f]` has shape `(Ns(f), T)`. `evidence[j]` is the likelihood of the
/// outcomes at time `j` over joint hidden states; only time points with
/// evidence receive a likelihood message. Once the free energy stops
/// increasing between sweeps the beliefs are frozen; the remaining sweeps
/// still record the (now constant) free energy.
pub fn estimate_states(
    store: &ModelStore,
    policy: &Policy,
    evidence: &[ArrayD<f64>],
    beliefs: &mut [Array2<f64>],
    settings: EstimationSettings,
) -> EstimationTrace {
    let factors = beliefs.len();
    let horizon = beliefs.first().map_or(0, |x| x.ncols());
    let mut belief_trace: Vec<Array3<f64>> = beliefs
        .iter()
        .map(|x| Array3::zeros((settings.iterations, x.nrows(), horizon)))
        .collect();
    let mut gradient_trace = belief_trace.clone();

    let mut history = Vec::with_capacity(settings.iterations);
    let mut frozen_at = None;

    for i in 0..settings.iterations {
        let mut free_energy = 0.0;
        for j in 0..horizon {
            let current: Vec<Array1<f64>> = beliefs.iter().map(|x| x.column(j).to_owned()).collect();
            let views: Vec<ArrayView1<'_, f64>> = current.iter().map(|x| x.view()).collect();

            for f in 0..factors {
                let log_belief = safe_log(&views[f]);

                let mut gradient = match evidence.get(j) {
                    Some(likelihood) => safe_log(&marginal_vector(likelihood.view(), &views, f)),
                    None => Array1::zeros(log_belief.len()),
                };

                let forward = if j == 0 {
                    store.initial_states[f].clone()
                } else {
                    let u = policy.action(j - 1, f);
                    store.transitions[f]
                        .slice(s![.., .., u])
                        .dot(&beliefs[f].column(j - 1))
                };
                gradient += &(safe_log(&forward) - &log_belief);

                if j + 1 < horizon {
                    let u = policy.action(j, f);
                    let backward = store.backward[f]
                        .slice(s![.., .., u])
                        .t()
                        .dot(&beliefs[f].column(j + 1));
                    gradient += &(safe_log(&backward) - &log_belief);
                }

                free_energy += views[f].dot(&gradient) / factors as f64;

                if frozen_at.is_none() {
                    let updated = softmax((&log_belief + &(&gradient / settings.tau)).view());
                    beliefs[f].column_mut(j).assign(&updated);
                }

                let mean = gradient.mean().unwrap_or(0.0);
                belief_trace[f].slice_mut(s![i, .., j]).assign(&beliefs[f].column(j));
                gradient_trace[f]
                    .slice_mut(s![i, .., j])
                    .assign(&gradient.mapv(|v| v - mean));
            }
        }

        if frozen_at.is_none()
            && let Some(&previous) = history.last()
            && free_energy - previous <= 0.0
        {
            frozen_at = Some(i);
        }
        history.push(free_energy);
    }

    tracing::trace!(
        sweeps = settings.iterations,
        frozen_at = ?frozen_at,
        free_energy = history.last().copied().unwrap_or(0.0),
        "state estimation finished"
    );

    EstimationTrace {
        free_energy: history.last().copied().unwrap_or(0.0),
        history,
        beliefs: belief_trace,
        gradients: gradient_trace,
        frozen_at,
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{IxDyn, array};

    use super::*;
    use crate::model::{GenerativeModel, ModelStore, store::joint_likelihood};

    fn store() -> ModelStore {
        let a = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 0.9 } else { 0.1 });
        let b = ndarray::Array3::from_shape_fn((2, 2, 1), |(next, previous, _)| if next == previous { 1.0 } else { 0.0 });
        let model = GenerativeModel::new(vec![a], vec![b], vec![Policy::new(vec![vec![0], vec![0]])]);
        ModelStore::new(&model).unwrap()
    }

    fn settings() -> EstimationSettings {
        EstimationSettings { iterations: 16, tau: 4.0 }
    }

    #[test]
    fn initial_beliefs_use_prior_then_uniform() {
        let beliefs = initial_beliefs(&store());
        assert_eq!(beliefs[0].dim(), (2, 3));
        assert_eq!(beliefs[0].column(0), array![0.5, 0.5]);
        assert_eq!(beliefs[0].column(2), array![0.5, 0.5]);
    }

    #[test]
    fn beliefs_remain_normalized() {
        let store = store();
        let policy = Policy::new(vec![vec![0], vec![0]]);
        let evidence = vec![joint_likelihood(&store.likelihood, &[array![1.0, 0.0]])];
        let mut beliefs = initial_beliefs(&store);
        estimate_states(&store, &policy, &evidence, &mut beliefs, settings());
        for column in beliefs[0].columns() {
            assert!((column.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn evidence_propagates_through_identity_dynamics() {
        let store = store();
        let policy = Policy::new(vec![vec![0], vec![0]]);
        let evidence = vec![joint_likelihood(&store.likelihood, &[array![1.0, 0.0]])];
        let mut beliefs = initial_beliefs(&store);
        estimate_states(&store, &policy, &evidence, &mut beliefs, settings());
        assert!(beliefs[0][[0, 0]] > 0.6);
        assert!(beliefs[0][[0, 2]] > 0.5, "future beliefs follow the present");
    }

    #[test]
    fn free_energy_freezes_once_it_stops_increasing() {
        // Single time point: the fixed point is x ∝ L·D and F rises toward log Σ L·D.
        let a = ArrayD::from_shape_fn(IxDyn(&[2, 2]), |ix| if ix[0] == ix[1] { 0.8 } else { 0.2 });
        let b = ndarray::Array3::from_shape_fn((2, 2, 1), |(next, previous, _)| if next == previous { 1.0 } else { 0.0 });
        let model = GenerativeModel::new(vec![a], vec![b], vec![Policy::new(Vec::new())])
            .with_initial_states(vec![array![0.7, 0.3]]);
        let store = ModelStore::new(&model).unwrap();
        assert_eq!(store.dims.horizon, 1);

        let policy = Policy::new(Vec::new());
        let evidence = vec![joint_likelihood(&store.likelihood, &[array![0.0, 1.0]])];
        let mut beliefs = initial_beliefs(&store);
        let settings = EstimationSettings { iterations: 256, tau: 4.0 };
        let trace = estimate_states(&store, &policy, &evidence, &mut beliefs, settings);

        let frozen = trace.frozen_at.expect("beliefs converge well within 256 sweeps");
        assert!(frozen > 1);
        for window in trace.history[..frozen].windows(2) {
            assert!(window[1] > window[0], "free energy rises until the freeze");
        }
        let settled = trace.history[frozen + 1];
        assert!(trace.history[frozen + 1..].iter().all(|&f| f == settled));

        let expected = [0.7 * 0.2 / (0.7 * 0.2 + 0.3 * 0.8), 0.3 * 0.8 / (0.7 * 0.2 + 0.3 * 0.8)];
        assert!((beliefs[0][[0, 0]] - expected[0]).abs() < 1e-6);
        assert!((beliefs[0][[1, 0]] - expected[1]).abs() < 1e-6);
        assert!((settled - (0.7 * 0.2 + 0.3 * 0.8_f64).ln()).abs() < 1e-6);
    }

    #[test]
    fn traces_have_one_slice_per_sweep() {
        let store = store();
        let policy = Policy::new(vec![vec![0], vec![0]]);
        let mut beliefs = initial_beliefs(&store);
        let trace = estimate_states(&store, &policy, &[], &mut beliefs, settings());
        assert_eq!(trace.beliefs[0].dim(), (16, 2, 3));
        let last = trace.beliefs[0].slice(s![15, .., ..]);
        assert_eq!(last, beliefs[0]);
        for column in trace.gradients[0].slice(s![0, .., ..]).columns() {
            assert!(column.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn anneal_flattens_sharp_beliefs() {
        let mut beliefs = vec![array![[0.9], [0.1]]];
        anneal(&mut beliefs, 4.0);
        assert!(beliefs[0][[0, 0]] < 0.9 && beliefs[0][[0, 0]] > 0.5);
        assert!((beliefs[0].sum() - 1.0).abs() < 1e-12);
    }
}
