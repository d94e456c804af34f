//! Statistical helper functions for qqscale.
//!
//! Everything here works on plain `f64` slices. Missing values are `NaN`;
//! functions whose name does not start with `nan`/`sorted_finite` expect
//! finite input.

use std::cmp::Ordering;

/// Mean of the finite values in `data`.
///
/// Returns `None` when no finite value is present.
pub fn nanmean(data: &[f64]) -> Option<f64> {
    let (sum, count) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Copies the finite values of `data` and sorts them ascending.
pub fn sorted_finite(data: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

/// R's default quantile algorithm (type=7).
///
/// **Expects pre-sorted input** (caller's responsibility).
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "quantile_type7: input must not be empty"
    );
    let n = sorted.len();
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Evaluates [`quantile_type7`] at every probability in `probs`.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantiles_type7(sorted: &[f64], probs: &[f64]) -> Vec<f64> {
    probs.iter().map(|&p| quantile_type7(sorted, p)).collect()
}

/// `n` probabilities at the centres of `n` equal-width bins of (0, 1):
/// `(i + 0.5) / n` for `i = 0..n`.
///
/// Returns an empty vector when `n` is zero.
pub fn equally_spaced_nodes(n: usize) -> Vec<f64> {
    let nf = n as f64;
    (0..n).map(|i| (i as f64 + 0.5) / nf).collect()
}

/// Percent rank of each value within `data`, in (0, 1].
///
/// Ranks are 1-based among the finite values, ties get their average rank,
/// and the result is `rank / n_finite`. `NaN` inputs stay `NaN`.
pub fn percent_rank(data: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..data.len()).filter(|&i| data[i].is_finite()).collect();
    order.sort_by(|&a, &b| data[a].partial_cmp(&data[b]).unwrap_or(Ordering::Equal));

    let n = order.len() as f64;
    let mut ranks = vec![f64::NAN; data.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && data[order[end]] == data[order[start]] {
            end += 1;
        }
        // positions start..end hold equal values; 1-based ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg / n;
        }
        start = end;
    }
    ranks
}

/// Fraction of finite values strictly below `threshold`.
///
/// Returns `None` when no finite value is present.
pub fn fraction_below(data: &[f64], threshold: f64) -> Option<f64> {
    let (below, count) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(b, c), &v| {
            (b + usize::from(v < threshold), c + 1)
        });
    (count > 0).then(|| below as f64 / count as f64)
}
