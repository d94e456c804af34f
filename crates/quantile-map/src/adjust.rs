//! Adjustment: applying trained factors to a target series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use qqscale_stats::percent_rank;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::{AdjustConfig, AdjustMethod, OutputGrid};
use crate::error::QuantileMapError;
use crate::factors::{AdjustmentFactorSet, FactorField};
use crate::grouping::GroupKey;
use crate::interp::FactorCurve;
use crate::partition::run_cells;
use crate::regrid::{Regridder, regrid_factor_field, regrid_field};
use crate::result::{Adjusted, AdjustedField};
use crate::series::{Field, Series, describe_grid};
use crate::ssr::{apply_ssr, reverse_ssr};

/// Indices of `series` grouped by the group their factors come from.
fn main_groups(series: &Series, factors: &AdjustmentFactorSet) -> BTreeMap<GroupKey, Vec<usize>> {
    let grouping = factors.grouping();
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (i, &date) in series.dates().iter().enumerate() {
        groups.entry(grouping.main_group(date)).or_default().push(i);
    }
    groups
}

fn clip(v: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let v = min.map_or(v, |lo| if v < lo { lo } else { v });
    max.map_or(v, |hi| if v > hi { hi } else { v })
}

/// Applies the factor curves of `factors` to `target`.
///
/// # Pipeline
///
/// 1. Unit check against the factor set
/// 2. Optional SSR
/// 3. Per group: factor from the `(hist_q, factor)` curve (EQM) or from the
///    `(node, factor)` curve at the value's percent rank within its group (QDM)
/// 4. Optional cap, then `value + factor` or `value * factor`
/// 5. Reverse SSR, clipping, reference-time shift and output slice
///
/// Missing values stay missing.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`QuantileMapError::InvalidConfig`] | invalid configuration |
/// | [`QuantileMapError::EmptyData`] | `target` is empty |
/// | [`QuantileMapError::UnitMismatch`] | target and factor units differ |
/// | [`QuantileMapError::MissingGroup`] | a target date falls in an untrained group |
pub fn adjust(
    target: &Series,
    factors: &AdjustmentFactorSet,
    config: &AdjustConfig,
) -> Result<Adjusted, QuantileMapError> {
    config.validate()?;
    if target.is_empty() {
        return Err(QuantileMapError::EmptyData {
            context: "target series is empty".to_string(),
        });
    }
    factors.check_compatible(target.units(), None)?;

    let mut values = if config.ssr() {
        let mut rng = StdRng::seed_from_u64(config.seed());
        apply_ssr(target.values(), config.ssr_threshold(), &mut rng)?
    } else {
        target.values().to_vec()
    };

    let scaling = factors.scaling();
    let mut extrapolated = 0usize;
    let mut capped = 0usize;

    for (key, indices) in main_groups(target, factors) {
        let curve_data = factors
            .group(key)
            .ok_or(QuantileMapError::MissingGroup { group: key })?;

        let (curve, positions) = match config.method() {
            AdjustMethod::Eqm => (
                FactorCurve::new(
                    &curve_data.hist_q,
                    &curve_data.factor,
                    config.interpolation(),
                    config.extrapolation(),
                ),
                indices.iter().map(|&i| values[i]).collect::<Vec<_>>(),
            ),
            AdjustMethod::Qdm => {
                let group_values: Vec<f64> = indices.iter().map(|&i| values[i]).collect();
                (
                    FactorCurve::new(
                        factors.nodes(),
                        &curve_data.factor,
                        config.interpolation(),
                        config.extrapolation(),
                    ),
                    percent_rank(&group_values),
                )
            }
        };

        for (&i, &x) in indices.iter().zip(&positions) {
            let v = values[i];
            if v.is_nan() {
                continue;
            }
            if curve.is_outside(x) {
                extrapolated += 1;
            }
            let mut f = curve.eval(x);
            if let (Some(max), false) = (config.max_factor(), f.is_nan()) {
                let c = scaling.cap(f, max);
                if c != f {
                    capped += 1;
                }
                f = c;
            }
            values[i] = scaling.apply(v, f);
        }
    }

    if config.ssr() {
        values = reverse_ssr(&values, config.ssr_threshold())?;
    }
    if config.valid_min().is_some() || config.valid_max().is_some() {
        for v in &mut values {
            *v = clip(*v, config.valid_min(), config.valid_max());
        }
    }

    let mut series = target.with_values(values);
    if config.ref_time() {
        let offset = factors.reference_period().start - target.dates()[0];
        debug!(days = offset.num_days(), "aligning output dates with the reference period");
        series = series.shifted(offset);
    }
    if let Some((start, end)) = config.output_slice() {
        series = series.slice(start, end);
    }

    if extrapolated > 0 {
        debug!(extrapolated, "values outside the factor curve range");
    }
    Ok(Adjusted::new(series, extrapolated, capped))
}

/// Brings `target` and `factors` onto one grid.
fn conform_grids(
    target: &Field,
    factors: &FactorField,
    output: OutputGrid,
    regridder: Option<&dyn Regridder>,
) -> Result<(Field, FactorField), QuantileMapError> {
    if target.grid() == factors.grid() {
        return Ok((target.clone(), factors.clone()));
    }
    let mismatch = || QuantileMapError::GridMismatch {
        expected: describe_grid(factors.grid()),
        got: describe_grid(target.grid()),
    };
    let (Some(target_grid), Some(factor_grid), Some(regridder)) =
        (target.grid(), factors.grid(), regridder)
    else {
        return Err(mismatch());
    };

    match output {
        OutputGrid::Input => {
            info!("regridding adjustment factors to the input grid");
            Ok((target.clone(), regrid_factor_field(factors, target_grid, regridder)?))
        }
        OutputGrid::Factors => {
            info!("regridding input data to the adjustment factor grid");
            Ok((regrid_field(target, factor_grid, regridder)?, factors.clone()))
        }
    }
}

/// Output dates of one adjusted cell, used to fill cells that failed.
fn output_dates(target: &Field, factors: &FactorField, config: &AdjustConfig) -> Vec<NaiveDate> {
    let Some(&first) = target.dates().first() else {
        return Vec::new();
    };
    let offset = match (config.ref_time(), factors.first()) {
        (true, Some(f)) => f.reference_period().start - first,
        _ => chrono::TimeDelta::zero(),
    };
    target
        .dates()
        .iter()
        .map(|&d| d + offset)
        .filter(|d| {
            config
                .output_slice()
                .is_none_or(|(start, end)| (start..=end).contains(d))
        })
        .collect()
}

/// Adjusts every cell of a field in parallel.
///
/// Grids are conformed first (see [`OutputGrid`]). Cells without factors
/// fail with [`QuantileMapError::MissingFactors`]; under
/// [`FailurePolicy::MarkMissing`](crate::FailurePolicy::MarkMissing) failed
/// cells are filled with `NaN`. Cell `i` uses seed `config.seed() + i`.
pub fn adjust_field(
    target: &Field,
    factors: &FactorField,
    config: &AdjustConfig,
    regridder: Option<&dyn Regridder>,
) -> Result<AdjustedField, QuantileMapError> {
    config.validate()?;
    factors.validate()?;
    let (target, factors) = conform_grids(target, factors, config.output_grid(), regridder)?;
    if target.len() != factors.len() {
        return Err(QuantileMapError::GridMismatch {
            expected: format!("{} factor cells", target.len()),
            got: format!("{} factor cells", factors.len()),
        });
    }

    info!(
        cells = target.len(),
        method = %config.method(),
        interpolation = %config.interpolation(),
        "applying adjustment factors"
    );

    let outcome = run_cells(&target.coords(), config.failure_policy(), |i| {
        let set = factors.cells()[i]
            .as_ref()
            .ok_or(QuantileMapError::MissingFactors { index: i })?;
        let cell_config = config.clone().with_seed(config.seed().wrapping_add(i as u64));
        adjust(&target.cells()[i], set, &cell_config)
    })?;

    let dates = output_dates(&target, &factors, config);
    let cells = outcome
        .results
        .into_iter()
        .zip(target.cells())
        .map(|(adjusted, source)| match adjusted {
            Some(a) => Ok(a.into_series()),
            None => Series::new(dates.clone(), vec![f64::NAN; dates.len()])
                .map(|s| s.with_units_opt(source.units().map(str::to_string))),
        })
        .collect::<Result<Vec<_>, QuantileMapError>>()?;

    Ok(AdjustedField::new(
        Field::with_cells(target.grid().cloned(), cells)?,
        outcome.failed,
    ))
}
