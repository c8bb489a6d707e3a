//! Action selection from the policy posterior.

use ndarray::{Array1, ArrayD, ArrayView1, IxDyn};
use rand::Rng;

use crate::{
    algebra::safe_log,
    model::Policy,
    utils::{sample_categorical, softmax},
};

/// Marginal posterior over joint actions at step `t`.
///
/// Each live policy adds its posterior probability to the cell of the joint
/// action it prescribes at `t`. The tensor has one axis per factor.
pub fn action_marginal(
    policies: &[Policy],
    live: &[usize],
    posterior: ArrayView1<'_, f64>,
    t: usize,
    controls: &[usize],
) -> ArrayD<f64> {
    let mut marginal = ArrayD::zeros(IxDyn(controls));
    for &k in live {
        marginal[policies[k].joint_action(t)] += posterior[k];
    }
    marginal
}

/// Sharpen a joint action marginal: `softmax(α · log(P))` over all cells.
///
/// ```
/// use active_mdp::inference::sharpen_actions;
/// use ndarray::{ArrayD, IxDyn};
///
/// let marginal = ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.4, 0.6]).unwrap();
/// let p = sharpen_actions(&marginal, 1.0);
/// assert!((p[IxDyn(&[1])] - 0.6).abs() < 1e-9);
/// ```
pub fn sharpen_actions(marginal: &ArrayD<f64>, alpha: f64) -> ArrayD<f64> {
    let logits: Array1<f64> = safe_log(marginal).iter().map(|&v| alpha * v).collect();
    let mut probabilities = marginal.clone();
    for (cell, p) in probabilities.iter_mut().zip(softmax(logits.view())) {
        *cell = p;
    }
    probabilities
}

/// Draw a joint action from `probabilities`; entries in `overrides` replace the drawn ones.
pub fn select_action<R: Rng + ?Sized>(rng: &mut R, probabilities: &ArrayD<f64>, overrides: &[Option<usize>]) -> Vec<usize> {
    let flat: Array1<f64> = probabilities.iter().copied().collect();
    let index = sample_categorical(rng, flat.view());
    let mut action = unravel(index, probabilities.shape());
    for (slot, forced) in action.iter_mut().zip(overrides) {
        if let Some(u) = forced {
            *slot = *u;
        }
    }
    action
}

/// Row-major multi-index of a flat position.
fn unravel(mut index: usize, shape: &[usize]) -> Vec<usize> {
    let mut out = vec![0; shape.len()];
    for (axis, &len) in shape.iter().enumerate().rev() {
        out[axis] = index % len;
        index /= len;
    }
    out
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn marginal_accumulates_policy_mass_per_action() {
        let policies = vec![
            Policy::new(vec![vec![0, 1]]),
            Policy::new(vec![vec![0, 1]]),
            Policy::new(vec![vec![1, 0]]),
        ];
        let posterior = array![0.2, 0.3, 0.5];
        let marginal = action_marginal(&policies, &[0, 1, 2], posterior.view(), 0, &[2, 2]);
        assert!((marginal[IxDyn(&[0, 1])] - 0.5).abs() < 1e-12);
        assert!((marginal[IxDyn(&[1, 0])] - 0.5).abs() < 1e-12);
        assert_eq!(marginal[IxDyn(&[0, 0])], 0.0);
    }

    #[test]
    fn pruned_policies_contribute_nothing() {
        let policies = vec![Policy::new(vec![vec![0]]), Policy::new(vec![vec![1]])];
        let posterior = array![0.4, 0.6];
        let marginal = action_marginal(&policies, &[1], posterior.view(), 0, &[2]);
        assert_eq!(marginal[IxDyn(&[0])], 0.0);
    }

    #[test]
    fn sharpening_is_a_row_major_softmax_over_cells() {
        let marginal = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.1, 0.4, 0.2, 0.3]).unwrap();
        let sharpened = sharpen_actions(&marginal, 2.0);
        let squares = [0.01, 0.16, 0.04, 0.09];
        let total: f64 = squares.iter().sum();
        for (cell, square) in sharpened.iter().zip(squares) {
            assert!((cell - square / total).abs() < 1e-9);
        }
        assert!((sharpened[IxDyn(&[0, 1])] - 0.16 / total).abs() < 1e-9);
    }

    #[test]
    fn unravel_is_row_major() {
        assert_eq!(unravel(5, &[2, 3]), vec![1, 2]);
        assert_eq!(unravel(0, &[4]), vec![0]);
    }

    #[test]
    fn overrides_replace_sampled_entries() {
        let mut rng = StdRng::seed_from_u64(1);
        let probabilities = ArrayD::from_elem(IxDyn(&[2, 3]), 1.0 / 6.0);
        for _ in 0..20 {
            let action = select_action(&mut rng, &probabilities, &[None, Some(2)]);
            assert_eq!(action[1], 2);
            assert!(action[0] < 2);
        }
    }

    #[test]
    fn sharpening_keeps_a_distribution() {
        let marginal = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.0, 0.3, 0.7]).unwrap();
        let p = sharpen_actions(&marginal, 16.0);
        let values: Array1<f64> = p.iter().copied().collect();
        assert!((values.sum() - 1.0).abs() < 1e-12);
        assert!(values[0] < 1e-100);
    }
}
