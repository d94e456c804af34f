//! Mean-change matching: rescales an adjusted series so that its change in
//! mean relative to the target equals the model's change in mean.

use std::collections::{BTreeMap, BTreeSet};

use qqscale_stats::nanmean;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{FailurePolicy, ScalingMode, ZERO_TOLERANCE};
use crate::error::QuantileMapError;
use crate::grouping::{GroupKey, Grouping};
use crate::partition::run_cells;
use crate::regrid::Regridder;
use crate::result::AdjustedField;
use crate::series::{Field, Grid, Series, describe_grid};

/// Mean of a series per group.
#[derive(Debug, Clone, PartialEq)]
pub struct Climatology {
    means: BTreeMap<GroupKey, f64>,
}

impl Climatology {
    /// Per-group mean of the finite values of `series`.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`QuantileMapError::InvalidConfig`] | `grouping` is windowed |
    /// | [`QuantileMapError::EmptyData`] | a group has no finite values |
    pub fn of(series: &Series, grouping: &Grouping) -> Result<Self, QuantileMapError> {
        check_grouping(grouping)?;
        let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
        for (date, v) in series.iter() {
            groups.entry(grouping.main_group(date)).or_default().push(v);
        }
        let means = groups
            .into_iter()
            .map(|(key, values)| {
                nanmean(&values)
                    .map(|m| (key, m))
                    .ok_or_else(|| QuantileMapError::EmptyData {
                        context: format!("no finite values for the climatology of group {key}"),
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { means })
    }

    pub fn get(&self, key: GroupKey) -> Option<f64> {
        self.means.get(&key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = GroupKey> + '_ {
        self.means.keys().copied()
    }
}

fn check_grouping(grouping: &Grouping) -> Result<(), QuantileMapError> {
    if !grouping.is_disjoint() {
        return Err(QuantileMapError::config(
            "grouping",
            format!("mean-change matching supports none or monthly grouping, got {grouping}"),
        ));
    }
    Ok(())
}

/// Per-group correction factors of the mean-change matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanChangeFactors {
    scaling: ScalingMode,
    grouping: Grouping,
    factors: Vec<(GroupKey, f64)>,
}

impl MeanChangeFactors {
    /// Combines the four climatologies into correction factors.
    ///
    /// Multiplicative: `(ref / hist) * target / adjusted`.
    /// Additive: `(ref - hist) - (adjusted - target)`.
    pub fn from_climatologies(
        scaling: ScalingMode,
        grouping: Grouping,
        adjusted: &Climatology,
        target: &Climatology,
        reference: &Climatology,
        historical: &Climatology,
    ) -> Result<Self, QuantileMapError> {
        check_grouping(&grouping)?;
        let factors = adjusted
            .keys()
            .map(|key| {
                let lookup = |c: &Climatology| c.get(key).ok_or(QuantileMapError::MissingGroup { group: key });
                let (adj, tgt, rf, hist) = (
                    lookup(adjusted)?,
                    lookup(target)?,
                    lookup(reference)?,
                    lookup(historical)?,
                );
                let factor = match scaling {
                    ScalingMode::Multiplicative => {
                        for (which, v) in [("historical", hist), ("adjusted", adj)] {
                            if v.abs() < ZERO_TOLERANCE {
                                return Err(QuantileMapError::DegenerateClimatology {
                                    group: key,
                                    which: which.to_string(),
                                });
                            }
                        }
                        (rf / hist) * tgt / adj
                    }
                    ScalingMode::Additive => (rf - hist) - (adj - tgt),
                };
                Ok((key, factor))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            scaling,
            grouping,
            factors,
        })
    }

    pub fn scaling(&self) -> ScalingMode {
        self.scaling
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    /// Factor of `key`, if present.
    pub fn factor(&self, key: GroupKey) -> Option<f64> {
        self.factors
            .binary_search_by(|(k, _)| k.cmp(&key))
            .ok()
            .map(|i| self.factors[i].1)
    }

    /// Applies the factors to `adjusted`.
    ///
    /// # Errors
    ///
    /// [`QuantileMapError::MissingGroup`] if a date falls in a group without a factor.
    pub fn apply(&self, adjusted: &Series) -> Result<Series, QuantileMapError> {
        let values = adjusted
            .iter()
            .map(|(date, v)| {
                let key = self.grouping.main_group(date);
                self.factor(key)
                    .map(|f| self.scaling.apply(v, f))
                    .ok_or(QuantileMapError::MissingGroup { group: key })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(adjusted.with_values(values))
    }
}

/// Trains mean-change factors for one location.
///
/// `adjusted` is the quantile-mapped output of `target`; `historical` and
/// `reference` are the model's historical and future-period series whose
/// change in mean is to be reproduced.
pub fn train_mean_change(
    adjusted: &Series,
    target: &Series,
    reference: &Series,
    historical: &Series,
    scaling: ScalingMode,
    grouping: Grouping,
) -> Result<MeanChangeFactors, QuantileMapError> {
    MeanChangeFactors::from_climatologies(
        scaling,
        grouping,
        &Climatology::of(adjusted, &grouping)?,
        &Climatology::of(target, &grouping)?,
        &Climatology::of(reference, &grouping)?,
        &Climatology::of(historical, &grouping)?,
    )
}

/// Trains and applies mean-change factors for one location.
pub fn match_mean_change(
    adjusted: &Series,
    target: &Series,
    reference: &Series,
    historical: &Series,
    scaling: ScalingMode,
    grouping: Grouping,
) -> Result<Series, QuantileMapError> {
    train_mean_change(adjusted, target, reference, historical, scaling, grouping)?.apply(adjusted)
}

/// Settings for [`match_mean_change_field`].
#[derive(Clone, Debug)]
pub struct MeanChangeConfig {
    scaling: ScalingMode,
    grouping: Grouping,
    failure_policy: FailurePolicy,
}

impl MeanChangeConfig {
    /// Defaults: `grouping = None`, `failure_policy = Abort`.
    pub fn new(scaling: ScalingMode) -> Self {
        Self {
            scaling,
            grouping: Grouping::None,
            failure_policy: FailurePolicy::Abort,
        }
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn scaling(&self) -> ScalingMode {
        self.scaling
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

/// Climatologies of every cell, regridded onto `target` if needed.
///
/// Cells whose climatology cannot be computed keep the error that stopped it.
/// After regridding, a target cell with no finite source value is
/// [`QuantileMapError::EmptyData`].
fn field_climatologies(
    field: &Field,
    grouping: &Grouping,
    target: Option<&Grid>,
    regridder: Option<&dyn Regridder>,
) -> Result<Vec<Result<Climatology, QuantileMapError>>, QuantileMapError> {
    let own: Vec<Result<Climatology, QuantileMapError>> = field
        .cells()
        .iter()
        .map(|c| Climatology::of(c, grouping))
        .collect();
    if field.grid() == target {
        return Ok(own);
    }

    let (Some(source), Some(target), Some(regridder)) = (field.grid(), target, regridder) else {
        return Err(QuantileMapError::GridMismatch {
            expected: describe_grid(target),
            got: describe_grid(field.grid()),
        });
    };
    info!(from = %source.describe(), to = %target.describe(), "regridding climatology");

    let keys: BTreeSet<GroupKey> = own.iter().flatten().flat_map(Climatology::keys).collect();
    let mut means: Vec<BTreeMap<GroupKey, f64>> = vec![BTreeMap::new(); target.len()];
    for key in keys {
        let slab: Vec<f64> = own
            .iter()
            .map(|c| c.as_ref().ok().and_then(|c| c.get(key)).unwrap_or(f64::NAN))
            .collect();
        for (cell, v) in means.iter_mut().zip(regridder.regrid(&slab, source, target)?) {
            if v.is_finite() {
                cell.insert(key, v);
            }
        }
    }
    Ok(means
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            if m.is_empty() {
                Err(QuantileMapError::EmptyData {
                    context: format!("no source climatology regridded onto cell {i}"),
                })
            } else {
                Ok(Climatology { means: m })
            }
        })
        .collect())
}

/// Mean-change matching for every cell of a field.
///
/// `adjusted` and `target` must share a grid. The historical and reference
/// climatologies are regridded onto that grid when theirs differs.
pub fn match_mean_change_field(
    adjusted: &Field,
    target: &Field,
    reference: &Field,
    historical: &Field,
    config: &MeanChangeConfig,
    regridder: Option<&dyn Regridder>,
) -> Result<AdjustedField, QuantileMapError> {
    if adjusted.grid() != target.grid() || adjusted.len() != target.len() {
        return Err(QuantileMapError::GridMismatch {
            expected: describe_grid(adjusted.grid()),
            got: describe_grid(target.grid()),
        });
    }
    if reference.grid() != historical.grid() {
        return Err(QuantileMapError::GridMismatch {
            expected: describe_grid(historical.grid()),
            got: describe_grid(reference.grid()),
        });
    }
    let grouping = config.grouping();
    check_grouping(&grouping)?;

    let grid = adjusted.grid();
    let ref_clim = field_climatologies(reference, &grouping, grid, regridder)?;
    let hist_clim = field_climatologies(historical, &grouping, grid, regridder)?;
    if ref_clim.len() != adjusted.len() {
        return Err(QuantileMapError::GridMismatch {
            expected: format!("{} cells", adjusted.len()),
            got: format!("{} cells", ref_clim.len()),
        });
    }

    info!(cells = adjusted.len(), scaling = %config.scaling(), grouping = %grouping, "matching mean change");

    let outcome = run_cells(&adjusted.coords(), config.failure_policy(), |i| {
        let rf = ref_clim[i].as_ref().map_err(Clone::clone)?;
        let hist = hist_clim[i].as_ref().map_err(Clone::clone)?;
        let adj_series = &adjusted.cells()[i];
        let factors = MeanChangeFactors::from_climatologies(
            config.scaling(),
            grouping,
            &Climatology::of(adj_series, &grouping)?,
            &Climatology::of(&target.cells()[i], &grouping)?,
            rf,
            hist,
        )?;
        factors.apply(adj_series)
    })?;

    let cells = outcome
        .results
        .into_iter()
        .zip(adjusted.cells())
        .map(|(r, source)| r.unwrap_or_else(|| source.map_values(|_| f64::NAN)))
        .collect();
    Ok(AdjustedField::new(
        Field::with_cells(adjusted.grid().cloned(), cells)?,
        outcome.failed,
    ))
}
