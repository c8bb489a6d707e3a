//! Concentration-parameter updates after a completed trajectory.
//!
//! Only entries that are already strictly positive grow; zeros mark outcomes
//! or transitions that are structurally impossible.

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView1, Zip, s};

use crate::{
    algebra::{accumulate_masked, cross},
    model::Policy,
};

/// Accumulate `η · O_g(t) ⊗ X_1(t) ⊗ … ⊗ X_Nf(t)` into each likelihood concentration.
///
/// `outcomes[g][t]` is the one-hot realized outcome of modality `g` at time `t`,
/// `averaged[f]` the model-averaged beliefs of factor `f`, shape `(Ns(f), T)`.
pub fn learn_likelihood(concentration: &mut [ArrayD<f64>], outcomes: &[Vec<Array1<f64>>], averaged: &[Array2<f64>], eta: f64) {
    for (a, observed) in concentration.iter_mut().zip(outcomes) {
        for (t, outcome) in observed.iter().enumerate() {
            let mut factors: Vec<ArrayView1<'_, f64>> = Vec::with_capacity(averaged.len() + 1);
            factors.push(outcome.view());
            factors.extend(averaged.iter().map(|x| x.column(t)));
            let increment = cross(&factors);
            accumulate_masked(a, &increment, eta);
        }
    }
}

/// Accumulate policy-weighted transition counts into each transition concentration.
///
/// For every time `t ≥ 1` and policy `k`, the outer product of the policy's
/// beliefs at `t` and `t - 1`, weighted by the policy's posterior probability
/// at `t - 1`, is added to the slice of the action the policy took at `t - 1`.
/// `beliefs[k][f]` has shape `(Ns(f), T)`, `posterior` shape `(Np, T)`.
pub fn learn_transitions(
    concentration: &mut [Array3<f64>],
    policies: &[Policy],
    beliefs: &[Vec<Array2<f64>>],
    posterior: &Array2<f64>,
    steps: usize,
    eta: f64,
) {
    for (f, b) in concentration.iter_mut().enumerate() {
        for t in 1..steps {
            for (k, policy) in policies.iter().enumerate() {
                let weight = posterior[[k, t - 1]];
                if weight <= 0.0 {
                    continue;
                }
                let u = policy.action(t - 1, f);
                let next = beliefs[k][f].column(t);
                let previous = beliefs[k][f].column(t - 1);
                let increment = outer(next, previous) * weight;
                Zip::from(b.slice_mut(s![.., .., u])).and(&increment).for_each(|c, &inc| {
                    if *c > 0.0 {
                        *c += eta * inc;
                    }
                });
            }
        }
    }
}

/// Add the averaged beliefs at time 0 to each positive initial-state concentration.
pub fn learn_initial_states(concentration: &mut [Array1<f64>], averaged: &[Array2<f64>]) {
    for (d, x) in concentration.iter_mut().zip(averaged) {
        let initial = x.column(0).to_owned();
        accumulate_masked(d, &initial, 1.0);
    }
}

fn outer(left: ArrayView1<'_, f64>, right: ArrayView1<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((left.len(), right.len()), |(i, j)| left[i] * right[j])
}
