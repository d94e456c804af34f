//! Spatial resampling between rectilinear grids.
//!
//! The quantile-mapping engine only needs one scalar per cell to be moved
//! from one grid to another. That is the [`Regridder`] seam; fields and
//! factor sets are regridded by applying it to one time step, group or node
//! at a time.

use tracing::info;

use crate::error::QuantileMapError;
use crate::factors::{AdjustmentFactorSet, FactorField, GroupFactors};
use crate::series::{Field, Grid, Series};

/// Resamples one scalar per cell from `source` onto `target`.
///
/// Implementations must return exactly `target.len()` values and fail with
/// [`QuantileMapError::GridMismatch`] when the grids do not overlap.
pub trait Regridder: Send + Sync {
    fn regrid(&self, values: &[f64], source: &Grid, target: &Grid)
    -> Result<Vec<f64>, QuantileMapError>;
}

/// Takes the value of the closest source row and column.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbour;

/// Index of the coordinate in `axis` closest to `x`, or `None` if `x` lies
/// more than one grid spacing outside the axis extent.
fn nearest_index(axis: &[f64], x: f64) -> Option<usize> {
    let (lo, hi) = axis
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let spacing = if axis.len() > 1 {
        (hi - lo) / (axis.len() - 1) as f64
    } else {
        0.0
    };
    if x < lo - spacing || x > hi + spacing {
        return None;
    }
    axis.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
        .map(|(i, _)| i)
}

impl Regridder for NearestNeighbour {
    fn regrid(
        &self,
        values: &[f64],
        source: &Grid,
        target: &Grid,
    ) -> Result<Vec<f64>, QuantileMapError> {
        if values.len() != source.len() {
            return Err(QuantileMapError::GridMismatch {
                expected: format!("{} values for {}", source.len(), source.describe()),
                got: format!("{} values", values.len()),
            });
        }
        let disjoint = |axis: &str, x: f64| QuantileMapError::GridMismatch {
            expected: format!("target {axis} within the extent of the {}", source.describe()),
            got: format!("{axis} {x}"),
        };

        let rows = target
            .lats()
            .iter()
            .map(|&lat| nearest_index(source.lats(), lat).ok_or_else(|| disjoint("lat", lat)))
            .collect::<Result<Vec<_>, _>>()?;
        let cols = target
            .lons()
            .iter()
            .map(|&lon| nearest_index(source.lons(), lon).ok_or_else(|| disjoint("lon", lon)))
            .collect::<Result<Vec<_>, _>>()?;

        let n_lon = source.lons().len();
        Ok(rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| values[r * n_lon + c]))
            .collect())
    }
}

/// Regrids every time step of a gridded `field` onto `target`.
pub(crate) fn regrid_field(
    field: &Field,
    target: &Grid,
    regridder: &dyn Regridder,
) -> Result<Field, QuantileMapError> {
    let source = field.grid().ok_or_else(|| QuantileMapError::GridMismatch {
        expected: target.describe(),
        got: "single point".to_string(),
    })?;
    info!(from = %source.describe(), to = %target.describe(), "regridding field");

    let n_time = field.dates().len();
    let mut columns = vec![Vec::with_capacity(n_time); target.len()];
    let mut slab = vec![0.0; field.len()];
    for t in 0..n_time {
        for (slot, cell) in slab.iter_mut().zip(field.cells()) {
            *slot = cell.values()[t];
        }
        for (column, v) in columns.iter_mut().zip(regridder.regrid(&slab, source, target)?) {
            column.push(v);
        }
    }

    let template = &field.cells()[0];
    let cells = columns
        .into_iter()
        .map(|values| {
            Series::new(field.dates().to_vec(), values)
                .map(|s| s.with_units_opt(template.units().map(str::to_string)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Field::gridded(target.clone(), cells)
}

fn hist_q_of(g: &GroupFactors) -> &[f64] {
    &g.hist_q
}

fn factor_of(g: &GroupFactors) -> &[f64] {
    &g.factor
}

/// Regrids the quantile and factor curves of a gridded factor field.
///
/// Target cells that pick up a missing source cell are left missing.
pub(crate) fn regrid_factor_field(
    factors: &FactorField,
    target: &Grid,
    regridder: &dyn Regridder,
) -> Result<FactorField, QuantileMapError> {
    let source = factors.grid().ok_or_else(|| QuantileMapError::GridMismatch {
        expected: target.describe(),
        got: "single point".to_string(),
    })?;
    factors.validate()?;
    let template = factors.first().ok_or_else(|| QuantileMapError::EmptyData {
        context: "factor field has no trained cells".to_string(),
    })?;
    info!(from = %source.describe(), to = %target.describe(), "regridding factors");

    let n_nodes = template.nodes().len();
    let mut curves: Vec<Vec<GroupFactors>> = (0..target.len())
        .map(|_| Vec::with_capacity(template.groups().len()))
        .collect();

    for g in template.groups() {
        let regrid_node = |curve: fn(&GroupFactors) -> &[f64], node: usize| {
            let slab: Vec<f64> = factors
                .cells()
                .iter()
                .map(|cell| {
                    cell.as_ref()
                        .and_then(|c| c.group(g.key))
                        .map_or(f64::NAN, |gf| curve(gf)[node])
                })
                .collect();
            regridder.regrid(&slab, source, target)
        };

        let mut hist_q = vec![Vec::with_capacity(n_nodes); target.len()];
        let mut factor = vec![Vec::with_capacity(n_nodes); target.len()];
        for node in 0..n_nodes {
            for (column, v) in hist_q.iter_mut().zip(regrid_node(hist_q_of, node)?) {
                column.push(v);
            }
            for (column, v) in factor.iter_mut().zip(regrid_node(factor_of, node)?) {
                column.push(v);
            }
        }
        for ((cell, hq), f) in curves.iter_mut().zip(hist_q).zip(factor) {
            cell.push(GroupFactors {
                key: g.key,
                hist_q: hq,
                factor: f,
            });
        }
    }

    let cells = curves
        .into_iter()
        .map(|groups| {
            let complete = groups
                .iter()
                .all(|g| g.hist_q.iter().chain(&g.factor).all(|v| v.is_finite()));
            if !complete {
                return Ok(None);
            }
            AdjustmentFactorSet::new(
                template.scaling(),
                template.grouping(),
                template.nodes().to_vec(),
                groups,
                template.historical_period(),
                template.reference_period(),
            )
            .map(|s| Some(s.with_units(template.units().map(str::to_string))))
        })
        .collect::<Result<Vec<_>, QuantileMapError>>()?;

    FactorField::new(Some(target.clone()), cells)
}
