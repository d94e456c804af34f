use approx::assert_relative_eq;
use chrono::NaiveDate;
use qqscale_calendar::noleap_sequence;
use qqscale_quantile_map::{
    AdjustConfig, AdjustmentFactorSet, FactorField, FailurePolicy, Field, Grid, GroupFactors,
    GroupKey, Grouping, Interpolation, NearestNeighbour, QuantileMapError, ScalingMode, Series,
    TrainConfig, TrainingPeriod, adjust_field, map_cells, train_field,
};
use qqscale_stats::equally_spaced_nodes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn noise(start_year: i32, seed: u64) -> Series {
    let dates = noleap_sequence(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), 5 * 365);
    let mut rng = StdRng::seed_from_u64(seed);
    let values = dates.iter().map(|_| rng.random_range(0.0..10.0)).collect();
    Series::new(dates, values).unwrap()
}

fn coarse_grid() -> Grid {
    Grid::new(vec![0.0, 2.0], vec![0.0, 2.0]).unwrap()
}

/// Historical and reference fields where cell `i` of the reference is the
/// historical cell shifted by `i + 1`.
fn shifted_fields(grid: &Grid) -> (Field, Field) {
    let hist: Vec<Series> = (0..grid.len()).map(|i| noise(1981, i as u64)).collect();
    let reference = hist
        .iter()
        .enumerate()
        .map(|(i, s)| s.map_values(|v| v + i as f64 + 1.0))
        .collect();
    (
        Field::gridded(grid.clone(), hist).unwrap(),
        Field::gridded(grid.clone(), reference).unwrap(),
    )
}

fn target_field(grid: &Grid) -> Field {
    let cells = (0..grid.len()).map(|i| noise(2041, 100 + i as u64)).collect();
    Field::gridded(grid.clone(), cells).unwrap()
}

fn additive() -> TrainConfig {
    TrainConfig::new(ScalingMode::Additive)
}

// ---------------------------------------------------------------------------
// 1. per_cell_factors
// ---------------------------------------------------------------------------
#[test]
fn per_cell_factors() {
    let grid = coarse_grid();
    let (hist, reference) = shifted_fields(&grid);
    let trained = train_field(&hist, &reference, &additive(), None).unwrap();
    assert!(trained.failed().is_empty());
    assert_eq!(trained.factors().grid(), Some(&grid));

    let target = target_field(&grid);
    let adjusted = adjust_field(&target, trained.factors(), &AdjustConfig::new(), None).unwrap();
    for (i, (t, a)) in target.cells().iter().zip(adjusted.field().cells()).enumerate() {
        for (tv, av) in t.values().iter().zip(a.values()) {
            assert_relative_eq!(av - tv, i as f64 + 1.0, epsilon = 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. mark_missing_isolates_failed_cell
// ---------------------------------------------------------------------------
#[test]
fn mark_missing_isolates_failed_cell() {
    let grid = coarse_grid();
    let (hist, reference) = shifted_fields(&grid);
    let mut cells = hist.into_cells();
    cells[2] = cells[2].map_values(|_| f64::NAN);
    let hist = Field::gridded(grid.clone(), cells).unwrap();

    let err = train_field(&hist, &reference, &additive(), None).unwrap_err();
    assert!(matches!(err, QuantileMapError::Partition { index: 2, .. }));

    let config = additive().with_failure_policy(FailurePolicy::MarkMissing);
    let trained = train_field(&hist, &reference, &config, None).unwrap();
    assert_eq!(trained.failed().len(), 1);
    assert_eq!(trained.failed()[0].index, 2);
    assert_eq!((trained.failed()[0].lat, trained.failed()[0].lon), (2.0, 0.0));
    assert!(trained.factors().cells()[2].is_none());

    let target = target_field(&grid);
    let err = adjust_field(&target, trained.factors(), &AdjustConfig::new(), None).unwrap_err();
    match err {
        QuantileMapError::Partition { index, source, .. } => {
            assert_eq!(index, 2);
            assert!(matches!(*source, QuantileMapError::MissingFactors { index: 2 }));
        }
        other => panic!("unexpected error: {other}"),
    }

    let adjust_config = AdjustConfig::new().with_failure_policy(FailurePolicy::MarkMissing);
    let adjusted = adjust_field(&target, trained.factors(), &adjust_config, None).unwrap();
    assert_eq!(adjusted.failed().len(), 1);
    let out = adjusted.field().cells();
    assert_eq!(out[2].dates(), target.dates());
    assert!(out[2].values().iter().all(|v| v.is_nan()));
    assert!(out[3].values().iter().all(|v| v.is_finite()));
}

// ---------------------------------------------------------------------------
// 3. factors_regridded_to_input_grid
// ---------------------------------------------------------------------------
#[test]
fn factors_regridded_to_input_grid() {
    let coarse = coarse_grid();
    let (hist, reference) = shifted_fields(&coarse);
    let trained = train_field(&hist, &reference, &additive(), None).unwrap();

    let fine = Grid::new(vec![0.0, 0.4, 2.0], vec![0.3, 1.8]).unwrap();
    let target = target_field(&fine);

    let err = adjust_field(&target, trained.factors(), &AdjustConfig::new(), None).unwrap_err();
    assert!(matches!(err, QuantileMapError::GridMismatch { .. }));

    let config = AdjustConfig::new().with_interpolation(Interpolation::Linear);
    let adjusted =
        adjust_field(&target, trained.factors(), &config, Some(&NearestNeighbour)).unwrap();
    assert_eq!(adjusted.field().grid(), Some(&fine));

    // coarse cell of each fine cell, row-major
    let source_cell = [0, 1, 0, 1, 2, 3];
    for ((t, a), src) in target.cells().iter().zip(adjusted.field().cells()).zip(source_cell) {
        for (tv, av) in t.values().iter().zip(a.values()) {
            assert_relative_eq!(av - tv, src as f64 + 1.0, epsilon = 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// 4. reference_regridded_for_training
// ---------------------------------------------------------------------------
#[test]
fn reference_regridded_for_training() {
    let coarse = coarse_grid();
    let (hist, _) = shifted_fields(&coarse);
    let fine = Grid::new(vec![0.0, 1.9], vec![0.1, 2.1, 2.5]).unwrap();
    let reference = Field::gridded(
        fine.clone(),
        (0..fine.len()).map(|i| noise(1981, 50 + i as u64)).collect(),
    )
    .unwrap();

    let err = train_field(&hist, &reference, &additive(), None).unwrap_err();
    assert!(matches!(err, QuantileMapError::GridMismatch { .. }));

    let trained = train_field(&hist, &reference, &additive(), Some(&NearestNeighbour)).unwrap();
    assert_eq!(trained.factors().grid(), Some(&coarse));
    assert_eq!(trained.factors().len(), coarse.len());
}

// ---------------------------------------------------------------------------
// 5. map_cells_visits_every_cell
// ---------------------------------------------------------------------------
#[test]
fn map_cells_visits_every_cell() {
    let target = target_field(&coarse_grid());
    let outcome = map_cells(&target, FailurePolicy::Abort, |i, s| Ok((i, s.len()))).unwrap();
    let got: Vec<(usize, usize)> = outcome.results.into_iter().flatten().collect();
    assert_eq!(got, vec![(0, 1825), (1, 1825), (2, 1825), (3, 1825)]);
}

// ---------------------------------------------------------------------------
// 6. mixed_node_counts_rejected_before_regridding
// ---------------------------------------------------------------------------
#[test]
fn mixed_node_counts_rejected_before_regridding() {
    let period = TrainingPeriod {
        start: NaiveDate::from_ymd_opt(1981, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(1985, 12, 31).unwrap(),
    };
    let cell = |n: usize| {
        AdjustmentFactorSet::new(
            ScalingMode::Additive,
            Grouping::None,
            equally_spaced_nodes(n),
            vec![GroupFactors {
                key: GroupKey::All,
                hist_q: (0..n).map(|i| i as f64).collect(),
                factor: vec![1.0; n],
            }],
            period,
            period,
        )
        .unwrap()
    };
    let factor_grid = Grid::new(vec![0.0], vec![0.0, 2.0]).unwrap();
    let factors = FactorField::new(Some(factor_grid), vec![Some(cell(10)), Some(cell(5))]).unwrap();

    let target = target_field(&Grid::new(vec![0.0], vec![0.0, 1.0, 2.0]).unwrap());
    let err = adjust_field(&target, &factors, &AdjustConfig::new(), Some(&NearestNeighbour))
        .unwrap_err();
    assert!(matches!(err, QuantileMapError::InvalidConfig { .. }), "{err}");
}
