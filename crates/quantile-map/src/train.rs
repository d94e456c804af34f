//! Training: quantile factors from historical model data and reference data.

use qqscale_stats::equally_spaced_nodes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::config::{DegeneratePolicy, GridSide, ScalingMode, TrainConfig, ZERO_TOLERANCE};
use crate::error::QuantileMapError;
use crate::factors::{AdjustmentFactorSet, FactorField, GroupFactors, TrainingPeriod};
use crate::freq::adapt_frequency;
use crate::grouping::GroupKey;
use crate::partition::run_cells;
use crate::quantiles::{QuantileTable, estimate_quantiles};
use crate::regrid::{Regridder, regrid_field};
use crate::result::{Trained, TrainedField};
use crate::series::{Field, Series, describe_grid};
use crate::ssr::apply_ssr;

fn period_of(series: &Series, name: &str) -> Result<TrainingPeriod, QuantileMapError> {
    TrainingPeriod::of(series).ok_or_else(|| QuantileMapError::EmptyData {
        context: format!("{name} series is empty"),
    })
}

/// Factor at one node, following the degenerate policy for zero
/// historical quantiles under multiplicative scaling.
fn node_factor(
    config: &TrainConfig,
    group: GroupKey,
    probability: f64,
    ref_q: f64,
    hist_q: f64,
) -> Result<f64, QuantileMapError> {
    let scaling = config.scaling();
    if scaling == ScalingMode::Multiplicative && hist_q.abs() < ZERO_TOLERANCE {
        return match (config.degenerate_policy(), config.max_factor()) {
            (DegeneratePolicy::Cap, Some(max)) => {
                let factor = if ref_q.abs() < ZERO_TOLERANCE { 1.0 } else { max };
                warn!(group = %group, probability, factor, "zero historical quantile, factor capped");
                Ok(factor)
            }
            _ => Err(QuantileMapError::DegenerateQuantile { group, probability }),
        };
    }
    Ok(scaling.factor(ref_q, hist_q))
}

/// Builds per-group factor curves from historical and reference quantiles.
fn factor_curves(
    hist: &QuantileTable,
    reference: &QuantileTable,
    config: &TrainConfig,
) -> Result<Vec<GroupFactors>, QuantileMapError> {
    hist.groups()
        .iter()
        .map(|h| {
            let ref_q = reference
                .get(h.key)
                .ok_or(QuantileMapError::MissingGroup { group: h.key })?;
            let factor = hist
                .nodes()
                .iter()
                .zip(&h.values)
                .zip(ref_q)
                .map(|((&p, &hq), &rq)| node_factor(config, h.key, p, rq, hq))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GroupFactors {
                key: h.key,
                hist_q: h.values.clone(),
                factor,
            })
        })
        .collect()
}

fn factor_set(
    hist: &Series,
    reference: &Series,
    nodes: &[f64],
    config: &TrainConfig,
    periods: (TrainingPeriod, TrainingPeriod),
) -> Result<AdjustmentFactorSet, QuantileMapError> {
    let grouping = config.grouping();
    let hist_q = estimate_quantiles(hist, nodes, &grouping)?;
    let ref_q = estimate_quantiles(reference, nodes, &grouping)?;
    let groups = factor_curves(&hist_q, &ref_q, config)?;
    Ok(AdjustmentFactorSet::new(
        config.scaling(),
        grouping,
        nodes.to_vec(),
        groups,
        periods.0,
        periods.1,
    )?
    .with_units(hist.units().map(str::to_string)))
}

/// Trains adjustment factors that map `historical` onto `reference`.
///
/// # Pipeline
///
/// 1. Optional SSR on both inputs
/// 2. Type-7 quantiles of both at `n_quantiles` equally spaced nodes, per group
/// 3. Factor per group and node: `ref_q - hist_q` or `ref_q / hist_q`
/// 4. Optional second set trained on the frequency-adapted historical series
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`QuantileMapError::InvalidConfig`] | invalid configuration |
/// | [`QuantileMapError::EmptyData`] | an input is empty or a group has no finite values |
/// | [`QuantileMapError::UnitMismatch`] | the inputs carry different units |
/// | [`QuantileMapError::MissingGroup`] | the reference lacks a historical group |
/// | [`QuantileMapError::DegenerateQuantile`] | zero historical quantile under `DegeneratePolicy::Error` |
pub fn train(
    historical: &Series,
    reference: &Series,
    config: &TrainConfig,
) -> Result<Trained, QuantileMapError> {
    config.validate()?;
    let periods = (
        period_of(historical, "historical")?,
        period_of(reference, "reference")?,
    );

    if let (Some(h), Some(r)) = (historical.units(), reference.units()) {
        if h != r {
            return Err(QuantileMapError::UnitMismatch {
                context: "reference data vs historical data".to_string(),
                expected: h.to_string(),
                got: r.to_string(),
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed());
    let (hist, reference) = if config.ssr() {
        let t = config.ssr_threshold();
        (
            historical.with_values(apply_ssr(historical.values(), t, &mut rng)?),
            reference.with_values(apply_ssr(reference.values(), t, &mut rng)?),
        )
    } else {
        (historical.clone(), reference.clone())
    };

    let nodes = equally_spaced_nodes(config.n_quantiles());
    let primary = factor_set(&hist, &reference, &nodes, config, periods)?;

    let frequency_adapted = match config.adapt_freq() {
        Some(threshold) => {
            let adapted =
                adapt_frequency(&hist, &reference, &config.grouping(), threshold, &mut rng)?;
            Some(factor_set(&adapted, &reference, &nodes, config, periods)?)
        }
        None => None,
    };

    Ok(Trained::new(primary, frequency_adapted))
}

/// Brings `historical` and `reference` onto one grid.
fn conform_grids(
    historical: &Field,
    reference: &Field,
    side: GridSide,
    regridder: Option<&dyn Regridder>,
) -> Result<(Field, Field), QuantileMapError> {
    if historical.grid() == reference.grid() {
        return Ok((historical.clone(), reference.clone()));
    }
    let mismatch = || QuantileMapError::GridMismatch {
        expected: describe_grid(historical.grid()),
        got: describe_grid(reference.grid()),
    };
    let (Some(hist_grid), Some(ref_grid), Some(regridder)) =
        (historical.grid(), reference.grid(), regridder)
    else {
        return Err(mismatch());
    };

    match side {
        GridSide::Historical => {
            info!("regridding reference data to the historical grid");
            Ok((historical.clone(), regrid_field(reference, hist_grid, regridder)?))
        }
        GridSide::Reference => {
            info!("regridding historical data to the reference grid");
            Ok((regrid_field(historical, ref_grid, regridder)?, reference.clone()))
        }
    }
}

/// Trains every cell of a field in parallel.
///
/// Grids are conformed first (see [`GridSide`]); differing grids without a
/// regridder are a [`QuantileMapError::GridMismatch`]. Cell `i` uses seed
/// `config.seed() + i`.
pub fn train_field(
    historical: &Field,
    reference: &Field,
    config: &TrainConfig,
    regridder: Option<&dyn Regridder>,
) -> Result<TrainedField, QuantileMapError> {
    config.validate()?;
    let (historical, reference) =
        conform_grids(historical, reference, config.grid_side(), regridder)?;
    if historical.len() != reference.len() {
        return Err(QuantileMapError::GridMismatch {
            expected: format!("{} cells", historical.len()),
            got: format!("{} cells", reference.len()),
        });
    }

    info!(
        cells = historical.len(),
        scaling = %config.scaling(),
        grouping = %config.grouping(),
        n_quantiles = config.n_quantiles(),
        "training adjustment factors"
    );

    let outcome = run_cells(&historical.coords(), config.failure_policy(), |i| {
        let cell_config = config.clone().with_seed(config.seed().wrapping_add(i as u64));
        train(&historical.cells()[i], &reference.cells()[i], &cell_config)
    })?;

    let grid = historical.grid().cloned();
    let adapted = config.adapt_freq().is_some();
    let (primary, frequency_adapted): (Vec<_>, Vec<_>) = outcome
        .results
        .into_iter()
        .map(|cell| match cell {
            Some(t) => {
                let fa = t.frequency_adapted().cloned();
                (Some(t.into_primary()), fa)
            }
            None => (None, None),
        })
        .unzip();

    let frequency_adapted = if adapted {
        Some(FactorField::new(grid.clone(), frequency_adapted)?)
    } else {
        None
    };
    Ok(TrainedField::new(
        FactorField::new(grid, primary)?,
        frequency_adapted,
        outcome.failed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::Grouping;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use qqscale_calendar::noleap_sequence;

    fn series(values: Vec<f64>) -> Series {
        let dates = noleap_sequence(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), values.len());
        Series::new(dates, values).unwrap()
    }

    #[test]
    fn identical_inputs_give_identity_factors() {
        let s = series((0..730).map(|i| 1.0 + (i % 97) as f64).collect());
        for scaling in [ScalingMode::Additive, ScalingMode::Multiplicative] {
            let config = TrainConfig::new(scaling).with_grouping(Grouping::Monthly);
            let t = train(&s, &s, &config).unwrap();
            for g in t.primary().groups() {
                for &f in &g.factor {
                    assert_relative_eq!(f, scaling.identity(), epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn additive_shift_is_recovered() {
        let hist = series((0..365).map(|i| i as f64).collect());
        let reference = series((0..365).map(|i| i as f64 + 2.5).collect());
        let t = train(&hist, &reference, &TrainConfig::new(ScalingMode::Additive)).unwrap();
        let g = t.primary().group(GroupKey::All).unwrap();
        assert!(g.factor.iter().all(|&f| (f - 2.5).abs() < 1e-9));
        assert_eq!(t.primary().nodes().len(), 100);
    }

    #[test]
    fn records_periods_and_units() {
        let hist = series(vec![1.0; 400]).with_units("mm d-1");
        let reference = series(vec![2.0; 400]).with_units("mm d-1");
        let t = train(&hist, &reference, &TrainConfig::new(ScalingMode::Multiplicative)).unwrap();
        let p = t.primary();
        assert_eq!(p.units(), Some("mm d-1"));
        assert_eq!(p.historical_period().start, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(p.reference_period().end, NaiveDate::from_ymd_opt(1991, 2, 4).unwrap());
    }

    #[test]
    fn unit_mismatch_between_inputs() {
        let hist = series(vec![1.0; 10]).with_units("K");
        let reference = series(vec![1.0; 10]).with_units("degC");
        let err = train(&hist, &reference, &TrainConfig::new(ScalingMode::Additive)).unwrap_err();
        assert!(matches!(err, QuantileMapError::UnitMismatch { .. }));
    }

    #[test]
    fn zero_quantile_errors_by_default() {
        let hist = series((0..100).map(|i| if i < 50 { 0.0 } else { 1.0 }).collect());
        let reference = series(vec![2.0; 100]);
        let config = TrainConfig::new(ScalingMode::Multiplicative).with_n_quantiles(10);
        let err = train(&hist, &reference, &config).unwrap_err();
        match err {
            QuantileMapError::DegenerateQuantile { group, probability } => {
                assert_eq!(group, GroupKey::All);
                assert_relative_eq!(probability, 0.05, epsilon = 1e-12);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_quantile_capped_when_configured() {
        let hist = series((0..100).map(|i| if i < 50 { 0.0 } else { 1.0 }).collect());
        let reference = series((0..100).map(|i| if i < 20 { 0.0 } else { 2.0 }).collect());
        let config = TrainConfig::new(ScalingMode::Multiplicative)
            .with_n_quantiles(10)
            .with_degenerate_policy(DegeneratePolicy::Cap)
            .with_max_factor(Some(5.0));
        let t = train(&hist, &reference, &config).unwrap();
        let f = &t.primary().group(GroupKey::All).unwrap().factor;
        // node 0.05: both quantiles zero → 1; node 0.25: ref 2, hist 0 → cap
        assert_relative_eq!(f[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(f[2], 5.0, epsilon = 1e-12);
        assert_relative_eq!(f[9], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn ssr_avoids_zero_quantiles() {
        let hist = series((0..200).map(|i| if i % 2 == 0 { 0.0 } else { 3.0 }).collect());
        let reference = series((0..200).map(|i| if i % 4 == 0 { 0.0 } else { 4.0 }).collect());
        let config = TrainConfig::new(ScalingMode::Multiplicative)
            .with_ssr(true)
            .with_seed(7);
        let t = train(&hist, &reference, &config).unwrap();
        let f = &t.primary().group(GroupKey::All).unwrap().factor;
        assert!(f.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn frequency_adapted_set_is_returned() {
        let hist = series((0..1000).map(|i| if i % 10 < 7 { 0.0 } else { 4.0 + (i % 3) as f64 }).collect());
        let reference = series((0..1000).map(|i| if i % 10 < 3 { 0.0 } else { 2.0 + (i % 7) as f64 }).collect());
        let config = TrainConfig::new(ScalingMode::Multiplicative)
            .with_ssr(true)
            .with_adapt_freq(Some(1.0))
            .with_seed(3);
        let t = train(&hist, &reference, &config).unwrap();
        let adapted = t.frequency_adapted().unwrap();
        assert_eq!(adapted.nodes(), t.primary().nodes());
        assert_ne!(adapted.groups(), t.primary().groups());
    }

    #[test]
    fn grid_mismatch_without_regridder() {
        use crate::series::Grid;
        let s = series(vec![1.0; 10]);
        let hist = Field::gridded(Grid::new(vec![0.0], vec![0.0, 1.0]).unwrap(), vec![s.clone(), s.clone()]).unwrap();
        let reference = Field::point(s);
        let err = train_field(&hist, &reference, &TrainConfig::new(ScalingMode::Additive), None).unwrap_err();
        assert!(matches!(err, QuantileMapError::GridMismatch { .. }));
    }
}
