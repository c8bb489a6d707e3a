//! Expected-free-energy building blocks.
//!
//! This module provides the pieces the policy evaluation combines:
//! - Predicted outcome distributions under factorized state beliefs
//! - Expected information gain about hidden states (epistemic value)
//! - Dirichlet KL divergence between learned and prior concentration tensors

use ndarray::{Array, Array1, ArrayD, ArrayView1, Axis, Dimension, RemoveAxis, Zip};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::{
    algebra::{DIGAMMA_SHIFT, cross, digamma_expectation, marginalize},
    utils::LOG_EPSILON,
};

/// Joint state configurations with less mass than this are skipped in the information gain.
const STATE_MASS_CUTOFF: f64 = 1.125_351_747_192_591e-7; // exp(-16)

/// Predicted outcome distribution `Σ_s A[o, s] Π_f x_f(s_f)` for one modality.
pub fn predicted_outcome(likelihood: &ArrayD<f64>, beliefs: &[ArrayView1<'_, f64>]) -> Array1<f64> {
    marginalize(likelihood.view(), beliefs, 1, None)
        .iter()
        .copied()
        .collect()
}

/// Expected information gain about hidden states from observing all modalities.
///
/// Mutual information between the joint outcome (cross product over modalities)
/// and the joint hidden state under the factorized beliefs:
/// `H[Σ_s q(s) p(o|s)] - Σ_s q(s) H[p(o|s)]`.
pub fn state_information_gain(likelihood: &[ArrayD<f64>], beliefs: &[ArrayView1<'_, f64>]) -> f64 {
    let joint_states = cross(beliefs);
    let mut predicted: Option<ArrayD<f64>> = None;
    let mut expected_log = 0.0;

    let mut column_index: Vec<usize> = vec![0; beliefs.len() + 1];
    for (state, &mass) in joint_states.indexed_iter() {
        if mass <= STATE_MASS_CUTOFF {
            continue;
        }
        column_index[1..].copy_from_slice(state.slice());

        let columns: Vec<Array1<f64>> = likelihood
            .iter()
            .map(|a| {
                (0..a.len_of(Axis(0)))
                    .map(|o| {
                        column_index[0] = o;
                        a[column_index.as_slice()]
                    })
                    .collect()
            })
            .collect();
        let views: Vec<ArrayView1<'_, f64>> = columns.iter().map(|c| c.view()).collect();
        let joint_outcome = cross(&views);

        expected_log += mass
            * joint_outcome
                .iter()
                .map(|&p| p * (p + LOG_EPSILON).ln())
                .sum::<f64>();
        predicted
            .get_or_insert_with(|| ArrayD::zeros(joint_outcome.raw_dim()))
            .scaled_add(mass, &joint_outcome);
    }

    let Some(predicted) = predicted else {
        return 0.0;
    };
    let predicted_log: f64 = predicted
        .iter()
        .map(|&p| p * (p + LOG_EPSILON).ln())
        .sum();
    expected_log - predicted_log
}

/// KL divergence `KL[Dir(posterior) || Dir(prior)]` summed over columns.
///
/// Only entries with positive prior concentration take part; zero entries are
/// structural and carry no uncertainty.
pub fn dirichlet_kl<D: RemoveAxis>(posterior: &Array<f64, D>, prior: &Array<f64, D>) -> f64 {
    let expected_log = digamma_expectation(posterior);
    let mut total = 0.0;
    Zip::from(posterior.lanes(Axis(0)))
        .and(prior.lanes(Axis(0)))
        .and(expected_log.lanes(Axis(0)))
        .for_each(|q, p, elog| {
            let (mut ln_b_q, mut ln_b_p, mut q0, mut p0, mut cross_term) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for ((&qi, &pi), &ei) in q.iter().zip(p.iter()).zip(elog.iter()) {
                if pi <= 0.0 {
                    continue;
                }
                ln_b_q += ln_gamma(qi);
                ln_b_p += ln_gamma(pi);
                q0 += qi;
                p0 += pi;
                cross_term += (qi - pi) * ei;
            }
            if p0 > 0.0 {
                cross_term -= (q0 - p0) * digamma(q0 + DIGAMMA_SHIFT);
                ln_b_q -= ln_gamma(q0);
                ln_b_p -= ln_gamma(p0);
                total += ln_b_p - ln_b_q + cross_term;
            }
        });
    total
}
