//! Probability algebra over categorical tensors.
//!
//! Every tensor here follows one convention: axis 0 indexes the levels of the
//! distribution and every other axis indexes a conditioning variable, so a
//! "column" is the 1-D lane along axis 0 with all other indices fixed.
//!
//! Contraction and outer products work on an arbitrary number of axes, which is
//! what lets a likelihood over `Nf` hidden-state factors be marginalized without
//! nesting loops per factor.

use ndarray::{Array, Array1, ArrayBase, ArrayD, ArrayView1, ArrayViewD, Axis, Data, Dimension, IxDyn, RemoveAxis, Zip};
use statrs::function::gamma::digamma;

use crate::utils::LOG_EPSILON;

/// Shift applied inside the digamma function when taking expectations under a Dirichlet.
pub const DIGAMMA_SHIFT: f64 = 1.0 / 16.0;

/// Normalize every column (lane along axis 0) to sum to one.
///
/// Columns whose sum is not positive become uniform.
///
/// ```
/// use active_mdp::algebra::normalize;
/// use ndarray::array;
///
/// let b = normalize(&array![[1.0, 0.0], [3.0, 0.0]]);
/// assert_eq!(b, array![[0.25, 0.5], [0.75, 0.5]]);
/// ```
pub fn normalize<D: Dimension>(tensor: &Array<f64, D>) -> Array<f64, D> {
    let mut out = tensor.clone();
    normalize_lanes(&mut out, Axis(0));
    out
}

/// Normalize rows (lanes along axis 1) instead of columns.
///
/// Applied to a transition kernel `B[next, previous, action]` this yields, for
/// each action, the reverse conditional used to pass messages from the future
/// back to the present. Requires at least two axes.
pub fn back_normalize<D: Dimension>(tensor: &Array<f64, D>) -> Array<f64, D> {
    debug_assert!(tensor.ndim() >= 2, "back normalization needs a matrix");
    let mut out = tensor.clone();
    normalize_lanes(&mut out, Axis(1));
    out
}

fn normalize_lanes<D: Dimension>(tensor: &mut Array<f64, D>, axis: Axis) {
    let levels = tensor.len_of(axis);
    if levels == 0 {
        return;
    }
    let uniform = 1.0 / levels as f64;
    for mut lane in tensor.lanes_mut(axis) {
        let total = lane.sum();
        if total.is_finite() && total > 0.0 {
            lane.mapv_inplace(|v| v / total);
        } else {
            lane.fill(uniform);
        }
    }
}

/// `log(x + ε)` element-wise, with ε = 1e-16.
pub fn safe_log<S: Data<Elem = f64>, D: Dimension>(tensor: &ArrayBase<S, D>) -> Array<f64, D> {
    tensor.mapv(|v| (v + LOG_EPSILON).ln())
}

/// Per-column totals (sum over axis 0).
pub fn column_sum<D: RemoveAxis>(tensor: &Array<f64, D>) -> Array<f64, D::Smaller> {
    tensor.sum_axis(Axis(0))
}

/// `ψ(c + 1/16)` element-wise: the unnormalized expected log-probability
/// under a Dirichlet with concentration `c`. Subtract `ψ(Σc + 1/16)` per column
/// for the normalized expectation.
pub fn digamma_expectation<D: Dimension>(concentration: &Array<f64, D>) -> Array<f64, D> {
    concentration.mapv(|c| digamma(c + DIGAMMA_SHIFT))
}

/// Novelty weights `1/Σc - 1/(c + ε)`, zero wherever the concentration is not positive.
///
/// The weights are non-positive; their contraction with predicted outcomes and
/// states is (minus) the expected information gain about the parameters.
pub fn novelty_weights<D: RemoveAxis>(concentration: &Array<f64, D>) -> Array<f64, D> {
    let totals = column_sum(concentration);
    let mut out = concentration.clone();
    Zip::from(out.lanes_mut(Axis(0)))
        .and(&totals)
        .for_each(|mut lane, &total| {
            lane.mapv_inplace(|c| {
                if c > 0.0 {
                    1.0 / total - 1.0 / (c + LOG_EPSILON)
                } else {
                    0.0
                }
            });
        });
    out
}

/// Contract the listed axes of `tensor` against vectors.
///
/// Each `(axis, vector)` pair sums `tensor` over `axis` weighted by `vector`;
/// the remaining axes keep their original relative order.
pub fn contract(tensor: ArrayViewD<'_, f64>, vectors: &[(usize, ArrayView1<'_, f64>)]) -> ArrayD<f64> {
    let mut pairs: Vec<(usize, ArrayView1<'_, f64>)> = vectors.to_vec();
    pairs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = tensor.to_owned();
    for (axis, vector) in pairs {
        debug_assert_eq!(out.len_of(Axis(axis)), vector.len(), "contraction length mismatch");
        out = out.map_axis(Axis(axis), |lane| lane.dot(&vector));
    }
    out
}

/// Contract every axis from `offset` onwards with the matching factor belief,
/// except the factor `skip` (if any).
///
/// With `offset = 1` this marginalizes a likelihood `A[o, s1, .., sNf]` onto its
/// outcome axis (`skip = None`), or onto outcome × one factor.
pub fn marginalize(
    tensor: ArrayViewD<'_, f64>,
    beliefs: &[ArrayView1<'_, f64>],
    offset: usize,
    skip: Option<usize>,
) -> ArrayD<f64> {
    let pairs: Vec<(usize, ArrayView1<'_, f64>)> = beliefs
        .iter()
        .enumerate()
        .filter(|(f, _)| Some(*f) != skip)
        .map(|(f, belief)| (f + offset, belief.view()))
        .collect();
    contract(tensor, &pairs)
}

/// Marginal of `tensor` over all factor axes except `factor`, as a vector.
pub fn marginal_vector(
    tensor: ArrayViewD<'_, f64>,
    beliefs: &[ArrayView1<'_, f64>],
    factor: usize,
) -> Array1<f64> {
    let reduced = marginalize(tensor, beliefs, 0, Some(factor));
    reduced.iter().copied().collect()
}

/// Outer product of vectors: `out[i1, .., in] = v1[i1] · … · vn[in]`.
pub fn cross(vectors: &[ArrayView1<'_, f64>]) -> ArrayD<f64> {
    let shape: Vec<usize> = vectors.iter().map(|v| v.len()).collect();
    ArrayD::from_shape_fn(IxDyn(&shape), |index| {
        vectors
            .iter()
            .enumerate()
            .map(|(axis, vector)| vector[index[axis]])
            .product()
    })
}

/// Add `increment · rate` to every entry of `concentration` that is already positive.
///
/// Zero entries encode structurally absent outcomes or transitions and never grow.
pub fn accumulate_masked<D: Dimension>(
    concentration: &mut Array<f64, D>,
    increment: &Array<f64, D>,
    rate: f64,
) {
    Zip::from(concentration).and(increment).for_each(|c, &inc| {
        if *c > 0.0 {
            *c += rate * inc;
        }
    });
}
