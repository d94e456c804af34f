//! Trained adjustment factors for one location and for a whole grid.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ScalingMode;
use crate::error::QuantileMapError;
use crate::grouping::{GroupKey, Grouping};
use crate::quantiles::validate_nodes;
use crate::series::{Grid, Series};

/// Inclusive date range of a training input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TrainingPeriod {
    /// First and last date of `series`, or `None` if it is empty.
    pub fn of(series: &Series) -> Option<Self> {
        Some(Self {
            start: series.start()?,
            end: series.end()?,
        })
    }
}

/// The `(hist_q, factor)` curve of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFactors {
    /// Group label.
    pub key: GroupKey,
    /// Historical quantiles at each node.
    pub hist_q: Vec<f64>,
    /// Adjustment factor at each node.
    pub factor: Vec<f64>,
}

/// Adjustment factors for one location.
///
/// Immutable once built; groups are kept in ascending key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactorSet {
    scaling: ScalingMode,
    grouping: Grouping,
    nodes: Vec<f64>,
    units: Option<String>,
    historical_period: TrainingPeriod,
    reference_period: TrainingPeriod,
    groups: Vec<GroupFactors>,
}

impl AdjustmentFactorSet {
    /// Builds a factor set and checks its invariants.
    ///
    /// # Errors
    ///
    /// See [`AdjustmentFactorSet::validate`].
    pub fn new(
        scaling: ScalingMode,
        grouping: Grouping,
        nodes: Vec<f64>,
        mut groups: Vec<GroupFactors>,
        historical_period: TrainingPeriod,
        reference_period: TrainingPeriod,
    ) -> Result<Self, QuantileMapError> {
        groups.sort_by_key(|g| g.key);
        let set = Self {
            scaling,
            grouping,
            nodes,
            units: None,
            historical_period,
            reference_period,
            groups,
        };
        set.validate()?;
        Ok(set)
    }

    /// Records the units of the historical data.
    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    /// Checks the structural invariants of a factor set.
    ///
    /// Used after deserialisation, since persisted files bypass
    /// [`AdjustmentFactorSet::new`].
    ///
    /// # Errors
    ///
    /// [`QuantileMapError::InvalidConfig`] if the nodes are invalid, a group
    /// curve has the wrong length, or group keys repeat or are out of order.
    pub fn validate(&self) -> Result<(), QuantileMapError> {
        validate_nodes(&self.nodes)?;
        self.grouping.validate()?;
        let n = self.nodes.len();
        for g in &self.groups {
            if g.hist_q.len() != n || g.factor.len() != n {
                return Err(QuantileMapError::config(
                    "factors",
                    format!(
                        "group {} has {} quantiles and {} factors, expected {n}",
                        g.key,
                        g.hist_q.len(),
                        g.factor.len()
                    ),
                ));
            }
        }
        if self.groups.windows(2).any(|w| w[1].key <= w[0].key) {
            return Err(QuantileMapError::config(
                "factors",
                "group keys must be unique and sorted",
            ));
        }
        Ok(())
    }

    pub fn scaling(&self) -> ScalingMode {
        self.scaling
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn historical_period(&self) -> TrainingPeriod {
        self.historical_period
    }

    pub fn reference_period(&self) -> TrainingPeriod {
        self.reference_period
    }

    pub fn groups(&self) -> &[GroupFactors] {
        &self.groups
    }

    /// Curve of `key`, if trained.
    pub fn group(&self, key: GroupKey) -> Option<&GroupFactors> {
        self.groups
            .binary_search_by(|g| g.key.cmp(&key))
            .ok()
            .map(|i| &self.groups[i])
    }

    /// Checks that data with `units` and a node count of `n_nodes` can be
    /// used with these factors. `None` skips the respective check.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`QuantileMapError::UnitMismatch`] | both unit labels are known and differ |
    /// | [`QuantileMapError::InvalidConfig`] | `n_nodes` differs from the node count |
    pub fn check_compatible(
        &self,
        units: Option<&str>,
        n_nodes: Option<usize>,
    ) -> Result<(), QuantileMapError> {
        match (self.units(), units) {
            (Some(expected), Some(got)) if expected != got => {
                return Err(QuantileMapError::UnitMismatch {
                    context: "target data vs adjustment factors".to_string(),
                    expected: expected.to_string(),
                    got: got.to_string(),
                });
            }
            (Some(_), Some(_)) => {}
            _ => tracing::debug!("units not recorded on both sides, skipping unit check"),
        }
        if let Some(n) = n_nodes {
            if n != self.nodes.len() {
                return Err(QuantileMapError::config(
                    "n_quantiles",
                    format!("factors have {} nodes, expected {n}", self.nodes.len()),
                ));
            }
        }
        Ok(())
    }
}

/// Factor sets for every cell of a field. `None` marks a cell whose training
/// failed under [`FailurePolicy::MarkMissing`](crate::FailurePolicy::MarkMissing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorField {
    grid: Option<Grid>,
    cells: Vec<Option<AdjustmentFactorSet>>,
}

impl FactorField {
    /// Factors of a single location.
    pub fn point(set: AdjustmentFactorSet) -> Self {
        Self {
            grid: None,
            cells: vec![Some(set)],
        }
    }

    /// # Errors
    ///
    /// [`QuantileMapError::GridMismatch`] if the number of cells does not fit
    /// the grid, or a point field does not have exactly one cell.
    pub fn new(
        grid: Option<Grid>,
        cells: Vec<Option<AdjustmentFactorSet>>,
    ) -> Result<Self, QuantileMapError> {
        let expected = grid.as_ref().map_or(1, Grid::len);
        if cells.len() != expected {
            return Err(QuantileMapError::GridMismatch {
                expected: format!("{expected} factor cells"),
                got: format!("{} factor cells", cells.len()),
            });
        }
        Ok(Self { grid, cells })
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn cells(&self) -> &[Option<AdjustmentFactorSet>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First trained cell.
    pub fn first(&self) -> Option<&AdjustmentFactorSet> {
        self.cells.iter().flatten().next()
    }

    /// Validates every present cell, and that all cells share the nodes,
    /// scaling, grouping and group keys of the first trained cell.
    pub fn validate(&self) -> Result<(), QuantileMapError> {
        let Some(first) = self.first() else {
            return Ok(());
        };
        for (i, cell) in self.cells.iter().enumerate() {
            let Some(cell) = cell else { continue };
            cell.validate()?;
            let differs = if cell.nodes() != first.nodes() {
                Some("quantile nodes")
            } else if cell.scaling() != first.scaling() {
                Some("scaling")
            } else if cell.grouping() != first.grouping() {
                Some("grouping")
            } else if !same_keys(cell, first) {
                Some("group keys")
            } else {
                None
            };
            if let Some(what) = differs {
                return Err(QuantileMapError::config(
                    "factors",
                    format!("cell {i} differs from the first trained cell in its {what}"),
                ));
            }
        }
        Ok(())
    }
}

fn same_keys(a: &AdjustmentFactorSet, b: &AdjustmentFactorSet) -> bool {
    a.groups().iter().map(|g| g.key).eq(b.groups().iter().map(|g| g.key))
}
