//! Vector-level helpers shared by the inference routines

use ndarray::{Array1, ArrayView1};
use rand::{Rng, distr::StandardUniform};

/// Offset added inside every logarithm so that zero probabilities stay finite.
pub const LOG_EPSILON: f64 = 1e-16;

/// Calculate Shannon entropy from a probability distribution.
///
/// The Shannon entropy is calculated as: H = -Σ(p * ln(p)) for p > 0
///
/// # Examples
///
/// ```
/// use active_mdp::utils::shannon_entropy;
///
/// let entropy = shannon_entropy([0.5, 0.5]);
/// assert!((entropy - std::f64::consts::LN_2).abs() < 1e-12);
///
/// let entropy = shannon_entropy([1.0, 0.0, 0.0]);
/// assert!(entropy.abs() < 1e-12);
/// ```
pub fn shannon_entropy<I>(probabilities: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    probabilities
        .into_iter()
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

/// Numerically stable softmax of a vector.
///
/// Non-finite maxima (all entries -inf) fall back to a uniform distribution.
///
/// ```
/// use active_mdp::utils::softmax;
/// use ndarray::array;
///
/// let p = softmax(array![0.0, 0.0].view());
/// assert_eq!(p, array![0.5, 0.5]);
/// ```
pub fn softmax(values: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = values.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Array1::from_elem(n, 1.0 / n as f64);
    }
    let exp = values.mapv(|v| (v - max).exp());
    let total = exp.sum();
    exp / total
}

/// Normalize a vector to sum to one, falling back to uniform when the total is not positive.
///
/// ```
/// use active_mdp::utils::normalize_vector;
/// use ndarray::array;
///
/// assert_eq!(normalize_vector(array![1.0, 3.0].view()), array![0.25, 0.75]);
/// assert_eq!(normalize_vector(array![0.0, 0.0].view()), array![0.5, 0.5]);
/// ```
pub fn normalize_vector(values: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = values.len();
    let total = values.sum();
    if !total.is_finite() || total <= 0.0 {
        return Array1::from_elem(n, 1.0 / n.max(1) as f64);
    }
    values.mapv(|v| v / total)
}

/// Draw an index from a categorical distribution.
///
/// Weights need not be normalized. If the total weight is not positive the
/// draw is uniform. The last index is returned if the cumulative sum never
/// crosses the threshold (rounding).
pub fn sample_categorical<R: Rng + ?Sized>(rng: &mut R, weights: ArrayView1<'_, f64>) -> usize {
    let n = weights.len();
    debug_assert!(n > 0, "categorical distribution needs at least one level");
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    let ticket: f64 = rng.sample(StandardUniform);
    if !total.is_finite() || total <= 0.0 {
        return ((ticket * n as f64) as usize).min(n - 1);
    }

    let mut threshold = ticket * total;
    for (idx, &weight) in weights.iter().enumerate() {
        let w = weight.max(0.0);
        if threshold < w {
            return idx;
        }
        threshold -= w;
    }
    n - 1
}

/// Finite-difference gradient of a sampled signal.
///
/// Central differences in the interior and one-sided differences at the ends;
/// a single sample has zero gradient.
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Index of the largest entry (first one on ties).
pub fn argmax(values: ArrayView1<'_, f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}
