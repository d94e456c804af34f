//! Per-group empirical quantiles.

use std::collections::BTreeMap;

use qqscale_stats::{quantiles_type7, sorted_finite};
use serde::{Deserialize, Serialize};

use crate::error::QuantileMapError;
use crate::grouping::{GroupKey, Grouping};
use crate::series::Series;

/// Quantile values of one group at shared probability nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileSet {
    /// Group label.
    pub key: GroupKey,
    /// Quantile values, non-decreasing, one per node.
    pub values: Vec<f64>,
}

/// Quantiles of every group of one series at one set of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileTable {
    nodes: Vec<f64>,
    grouping: Grouping,
    groups: Vec<QuantileSet>,
}

impl QuantileTable {
    /// Probability nodes shared by every group.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    /// Groups in ascending key order.
    pub fn groups(&self) -> &[QuantileSet] {
        &self.groups
    }

    /// Quantile values of `key`, if the group had any members.
    pub fn get(&self, key: GroupKey) -> Option<&[f64]> {
        self.groups
            .binary_search_by(|g| g.key.cmp(&key))
            .ok()
            .map(|i| self.groups[i].values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Checks that `nodes` is non-empty, strictly increasing and inside (0, 1).
pub(crate) fn validate_nodes(nodes: &[f64]) -> Result<(), QuantileMapError> {
    if nodes.is_empty() {
        return Err(QuantileMapError::config("nodes", "at least one node is required"));
    }
    if let Some(&p) = nodes.iter().find(|&&p| !(p > 0.0 && p < 1.0)) {
        return Err(QuantileMapError::config(
            "nodes",
            format!("probabilities must lie in (0, 1), got {p}"),
        ));
    }
    if nodes.windows(2).any(|w| w[1] <= w[0]) {
        return Err(QuantileMapError::config(
            "nodes",
            "probabilities must be strictly increasing",
        ));
    }
    Ok(())
}

/// Collects the values of `series` into their training groups.
///
/// Every group with at least one membership is present, even when all of its
/// values are missing.
pub(crate) fn group_values(series: &Series, grouping: &Grouping) -> BTreeMap<GroupKey, Vec<f64>> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for (date, value) in series.iter() {
        for key in grouping.memberships(date) {
            groups.entry(key).or_default().push(value);
        }
    }
    groups
}

/// Type-7 quantiles of `series` at `nodes` for every group of `grouping`.
///
/// Missing values are ignored. A group with fewer values than nodes still
/// yields a non-decreasing curve.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`QuantileMapError::InvalidConfig`] | bad nodes or grouping |
/// | [`QuantileMapError::EmptyData`] | series is empty, or a group has members but no finite values |
pub fn estimate_quantiles(
    series: &Series,
    nodes: &[f64],
    grouping: &Grouping,
) -> Result<QuantileTable, QuantileMapError> {
    validate_nodes(nodes)?;
    grouping.validate()?;
    if series.is_empty() {
        return Err(QuantileMapError::EmptyData {
            context: "cannot estimate quantiles of an empty series".to_string(),
        });
    }

    let groups = group_values(series, grouping)
        .into_iter()
        .map(|(key, values)| {
            let sorted = sorted_finite(&values);
            if sorted.is_empty() {
                return Err(QuantileMapError::EmptyData {
                    context: format!("group {key} has no finite values"),
                });
            }
            Ok(QuantileSet {
                key,
                values: quantiles_type7(&sorted, nodes),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuantileTable {
        nodes: nodes.to_vec(),
        grouping: *grouping,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use qqscale_calendar::noleap_sequence;
    use qqscale_stats::equally_spaced_nodes;

    fn year_series(f: impl Fn(usize) -> f64) -> Series {
        let dates = noleap_sequence(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(), 365);
        let values = (0..365).map(f).collect();
        Series::new(dates, values).unwrap()
    }

    #[test]
    fn ungrouped_quantiles_match_type7() {
        let s = year_series(|i| i as f64);
        let t = estimate_quantiles(&s, &[0.25, 0.5], &Grouping::None).unwrap();
        let q = t.get(GroupKey::All).unwrap();
        assert_relative_eq!(q[0], 91.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], 182.0, epsilon = 1e-12);
    }

    #[test]
    fn monthly_groups_present_and_monotone() {
        let s = year_series(|i| ((i * 7919) % 365) as f64);
        let t = estimate_quantiles(&s, &equally_spaced_nodes(20), &Grouping::Monthly).unwrap();
        assert_eq!(t.len(), 12);
        for g in t.groups() {
            assert!(g.values.windows(2).all(|w| w[0] <= w[1]), "{}", g.key);
        }
    }

    #[test]
    fn missing_values_ignored() {
        let s = year_series(|i| if i % 2 == 0 { f64::NAN } else { 1.0 });
        let t = estimate_quantiles(&s, &[0.1, 0.9], &Grouping::None).unwrap();
        assert_eq!(t.get(GroupKey::All).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn all_missing_group_is_an_error() {
        let s = year_series(|i| if i < 31 { f64::NAN } else { 1.0 });
        let err = estimate_quantiles(&s, &[0.5], &Grouping::Monthly).unwrap_err();
        assert!(matches!(err, QuantileMapError::EmptyData { .. }));
    }

    #[test]
    fn rejects_bad_nodes() {
        let s = year_series(|i| i as f64);
        for nodes in [vec![], vec![0.0, 0.5], vec![0.5, 0.5], vec![0.5, 1.0]] {
            assert!(estimate_quantiles(&s, &nodes, &Grouping::None).is_err());
        }
    }

    #[test]
    fn windowed_groups_pool_neighbours() {
        // January = 1, February = 2, ..., so the 3-month window around
        // January pools December, January and February.
        let s = year_series(|i| f64::from(qqscale_calendar::Doy::new(i as u16 + 1).unwrap().month()));
        let t = estimate_quantiles(&s, &[0.01, 0.99], &"3monthly".parse().unwrap()).unwrap();
        let jan = t.get(GroupKey::Month(1)).unwrap();
        assert_relative_eq!(jan[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(jan[1], 12.0, epsilon = 1e-12);
    }
}
