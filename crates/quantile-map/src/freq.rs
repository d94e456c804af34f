//! Frequency adaptation of dry days before multiplicative training.
//!
//! When a model has more dry days (values below a threshold) than the
//! reference, a multiplicative factor cannot lift them to the reference's wet
//! values. A fraction `dP0 = (P0_hist - P0_ref) / P0_hist` of the dry
//! historical values is therefore redrawn uniformly between the threshold and
//! the reference quantile at `P0_hist`.

use std::collections::BTreeMap;

use qqscale_stats::{fraction_below, quantile_type7, sorted_finite};
use rand::Rng;
use tracing::debug;

use crate::error::QuantileMapError;
use crate::grouping::{GroupKey, Grouping};
use crate::quantiles::group_values;
use crate::series::Series;

/// Per-group parameters of the adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DryAdjustment {
    /// Probability that a dry historical value is redrawn.
    pub(crate) dp0: f64,
    /// Upper bound of the redraw (reference quantile at `P0_hist`).
    pub(crate) upper: f64,
}

/// Computes [`DryAdjustment`] for every group where the historical dry
/// fraction exceeds the reference's.
pub(crate) fn dry_adjustments(
    historical: &Series,
    reference: &Series,
    grouping: &Grouping,
    threshold: f64,
) -> BTreeMap<GroupKey, DryAdjustment> {
    let hist_groups = group_values(historical, grouping);
    let ref_groups = group_values(reference, grouping);

    let mut out = BTreeMap::new();
    for (key, hist_values) in &hist_groups {
        let Some(ref_values) = ref_groups.get(key) else {
            continue;
        };
        let (Some(p0_hist), Some(p0_ref)) = (
            fraction_below(hist_values, threshold),
            fraction_below(ref_values, threshold),
        ) else {
            continue;
        };
        if p0_hist <= p0_ref {
            continue;
        }
        let dp0 = (p0_hist - p0_ref) / p0_hist;
        let upper = quantile_type7(&sorted_finite(ref_values), p0_hist).max(threshold);
        debug!(group = %key, p0_hist, p0_ref, dp0, upper, "frequency adaptation");
        out.insert(*key, DryAdjustment { dp0, upper });
    }
    out
}

/// Returns `historical` with part of its dry values redrawn so that each
/// group's dry-day frequency matches `reference`.
///
/// # Errors
///
/// [`QuantileMapError::InvalidConfig`] if `threshold` is not finite and positive.
pub fn adapt_frequency<R: Rng>(
    historical: &Series,
    reference: &Series,
    grouping: &Grouping,
    threshold: f64,
    rng: &mut R,
) -> Result<Series, QuantileMapError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(QuantileMapError::config(
            "adapt_freq",
            format!("threshold must be finite and > 0, got {threshold}"),
        ));
    }
    let adjustments = dry_adjustments(historical, reference, grouping, threshold);

    let values = historical
        .iter()
        .map(|(date, v)| {
            if v.is_nan() || v >= threshold {
                return v;
            }
            match adjustments.get(&grouping.main_group(date)) {
                Some(adj) if rng.random::<f64>() < adj.dp0 => {
                    threshold + rng.random::<f64>() * (adj.upper - threshold)
                }
                _ => v,
            }
        })
        .collect();

    Ok(historical.with_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qqscale_calendar::noleap_sequence;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn series(values: Vec<f64>) -> Series {
        let dates = noleap_sequence(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(), values.len());
        Series::new(dates, values).unwrap()
    }

    #[test]
    fn dp0_from_dry_fractions() {
        // hist: 80% dry, ref: 40% dry → dP0 = 0.5
        let hist = series((0..100).map(|i| if i < 80 { 0.0 } else { 5.0 }).collect());
        let reference = series((0..100).map(|i| if i < 40 { 0.0 } else { 2.0 + i as f64 }).collect());
        let adj = dry_adjustments(&hist, &reference, &Grouping::None, 1.0);
        let a = adj[&GroupKey::All];
        assert!((a.dp0 - 0.5).abs() < 1e-12);
        assert!(a.upper >= 1.0);
    }

    #[test]
    fn no_adaptation_when_hist_is_wetter() {
        let hist = series(vec![5.0; 50]);
        let reference = series((0..50).map(|i| if i < 10 { 0.0 } else { 3.0 }).collect());
        assert!(dry_adjustments(&hist, &reference, &Grouping::None, 1.0).is_empty());
    }

    #[test]
    fn adapted_dry_fraction_approaches_reference() {
        let n = 5000;
        let hist = series((0..n).map(|i| if i % 10 < 8 { 0.0 } else { 5.0 }).collect());
        let reference = series((0..n).map(|i| if i % 10 < 4 { 0.0 } else { 1.0 + (i % 10) as f64 }).collect());
        let mut rng = StdRng::seed_from_u64(42);
        let adapted = adapt_frequency(&hist, &reference, &Grouping::None, 1.0, &mut rng).unwrap();

        let dry = fraction_below(adapted.values(), 1.0).unwrap();
        assert!((dry - 0.4).abs() < 0.03, "dry fraction {dry}");
        // redrawn values lie between the threshold and the reference quantile
        let upper = quantile_type7(&sorted_finite(reference.values()), 0.8);
        assert!(
            adapted
                .values()
                .iter()
                .all(|&v| v == 0.0 || v == 5.0 || (1.0..=upper).contains(&v))
        );
    }

    #[test]
    fn rejects_bad_threshold() {
        let s = series(vec![1.0; 3]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(adapt_frequency(&s, &s, &Grouping::None, -1.0, &mut rng).is_err());
    }
}
