use approx::assert_relative_eq;
use chrono::NaiveDate;
use qqscale_calendar::{month_of, noleap_sequence};
use qqscale_quantile_map::{
    AdjustConfig, AdjustMethod, GroupKey, Grouping, Interpolation, ScalingMode, Series,
    TrainConfig, adjust, estimate_quantiles, train,
};
use qqscale_stats::{equally_spaced_nodes, percent_rank, quantile_type7, sorted_finite};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const N_YEARS: usize = 20;

/// Uniform(0, 100) daily values over `N_YEARS` no-leap years from `start_year`.
fn synthetic(start_year: i32, seed: u64) -> Series {
    let dates = noleap_sequence(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), N_YEARS * 365);
    let mut rng = StdRng::seed_from_u64(seed);
    let values = dates.iter().map(|_| rng.random_range(0.0..100.0)).collect();
    Series::new(dates, values).unwrap()
}

/// Daily maximum temperature with a seasonal cycle and a warming trend of
/// 0.1 per year, over `N_YEARS` no-leap years from 2000.
fn seasonal_with_trend(seed: u64) -> Series {
    let dates = noleap_sequence(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), N_YEARS * 365);
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..dates.len())
        .map(|i| {
            let doy = (i % 365 + 1) as f64;
            -13.0 * (2.0 * std::f64::consts::PI * doy / 365.0).cos()
                + 2.0 * rng.random::<f64>()
                + 20.0
                + 0.1 * i as f64 / 365.0
        })
        .collect();
    Series::new(dates, values).unwrap().with_units("C")
}

/// Values of `series` falling in `month`.
fn month_values(series: &Series, month: u8) -> Vec<f64> {
    series
        .iter()
        .filter(|(d, _)| month_of(*d) == month)
        .map(|(_, v)| v)
        .collect()
}

fn monthly_medians(series: &Series) -> [f64; 12] {
    std::array::from_fn(|m| quantile_type7(&sorted_finite(&month_values(series, m as u8 + 1)), 0.5))
}

/// Shifts values above their monthly median by `10 * month`, then adds 1
/// to everything.
fn reference_of(hist: &Series) -> Series {
    let medians = monthly_medians(hist);
    let values = hist
        .iter()
        .map(|(d, v)| {
            let m = month_of(d);
            let shifted = if v > medians[m as usize - 1] { v + 10.0 * f64::from(m) } else { v };
            shifted + 1.0
        })
        .collect();
    Series::new(hist.dates().to_vec(), values).unwrap()
}

fn expected_factor(p: f64, month: u8) -> f64 {
    if p < 0.5 { 1.0 } else { 1.0 + 10.0 * f64::from(month) }
}

fn monthly_config() -> TrainConfig {
    TrainConfig::new(ScalingMode::Additive).with_grouping(Grouping::Monthly)
}

// ---------------------------------------------------------------------------
// 1. factors_of_monthly_scenario
// ---------------------------------------------------------------------------
#[test]
fn factors_of_monthly_scenario() {
    let hist = synthetic(1981, 7);
    let reference = reference_of(&hist);
    let trained = train(&hist, &reference, &monthly_config()).unwrap();
    let set = trained.primary();

    assert_eq!(set.groups().len(), 12);
    assert_eq!(set.nodes().len(), 100);
    for m in 1..=12u8 {
        let group = set.group(GroupKey::Month(m)).unwrap();
        for (p, f) in set.nodes().iter().zip(&group.factor) {
            assert_relative_eq!(*f, expected_factor(*p, m), epsilon = 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. eqm_reproduces_reference_away_from_median
// ---------------------------------------------------------------------------
#[test]
fn eqm_reproduces_reference_away_from_median() {
    let hist = synthetic(1981, 11);
    let reference = reference_of(&hist);
    let trained = train(&hist, &reference, &monthly_config()).unwrap();
    let set = trained.primary();

    let config = AdjustConfig::new().with_interpolation(Interpolation::Linear);
    let adjusted = adjust(&hist, set, &config).unwrap();
    assert_eq!(adjusted.series().dates(), hist.dates());

    // Between the nodes on either side of the median the factor is blended.
    let mut checked = 0;
    for ((d, h), (a, r)) in hist.iter().zip(adjusted.series().values().iter().zip(reference.values())) {
        let group = set.group(GroupKey::Month(month_of(d))).unwrap();
        if h < group.hist_q[49] || h > group.hist_q[50] {
            assert_relative_eq!(*a, *r, epsilon = 1e-9);
            checked += 1;
        }
    }
    assert!(checked > hist.len() * 9 / 10);
}

// ---------------------------------------------------------------------------
// 3. qdm_applies_factor_by_rank
// ---------------------------------------------------------------------------
#[test]
fn qdm_applies_factor_by_rank() {
    let hist = synthetic(1981, 3);
    let reference = reference_of(&hist);
    let trained = train(&hist, &reference, &monthly_config()).unwrap();

    // A future target with a different distribution than the training data.
    let target = synthetic(2041, 5).map_values(|v| 2.0 * v + 50.0);
    let config = AdjustConfig::new().with_method(AdjustMethod::Qdm);
    let adjusted = adjust(&target, trained.primary(), &config).unwrap();

    for m in 1..=12u8 {
        let tv = month_values(&target, m);
        let av = month_values(adjusted.series(), m);
        for ((t, a), r) in tv.iter().zip(&av).zip(percent_rank(&tv)) {
            if r < 0.49 || r > 0.51 {
                assert_relative_eq!(a - t, expected_factor(r, m), epsilon = 1e-9);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 4. identical_inputs_give_identity
// ---------------------------------------------------------------------------
#[test]
fn identical_inputs_give_identity() {
    let hist = synthetic(1981, 13).map_values(|v| v + 1.0);
    for scaling in [ScalingMode::Additive, ScalingMode::Multiplicative] {
        let config = TrainConfig::new(scaling).with_grouping(Grouping::Monthly);
        let trained = train(&hist, &hist, &config).unwrap();
        for group in trained.primary().groups() {
            assert!(group.factor.iter().all(|&f| (f - scaling.identity()).abs() < 1e-12));
        }
        let adjusted = adjust(&hist, trained.primary(), &AdjustConfig::new()).unwrap();
        for (a, h) in adjusted.series().values().iter().zip(hist.values()) {
            assert_relative_eq!(*a, *h, epsilon = 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// 5. hist_quantiles_monotone
// ---------------------------------------------------------------------------
#[test]
fn hist_quantiles_monotone() {
    let hist = synthetic(1981, 17);
    let config = monthly_config().with_n_quantiles(50);
    let trained = train(&hist, &reference_of(&hist), &config).unwrap();
    for group in trained.primary().groups() {
        assert!(group.hist_q.windows(2).all(|w| w[0] <= w[1]), "group {}", group.key);
    }
}

// ---------------------------------------------------------------------------
// 6. seeded_runs_are_reproducible
// ---------------------------------------------------------------------------
#[test]
fn seeded_runs_are_reproducible() {
    let hist = synthetic(1981, 19).map_values(|v| if v < 30.0 { 0.0 } else { v });
    let reference = reference_of(&hist);
    let config = TrainConfig::new(ScalingMode::Multiplicative)
        .with_grouping(Grouping::Monthly)
        .with_ssr(true)
        .with_seed(42);
    let a = train(&hist, &reference, &config).unwrap();
    let b = train(&hist, &reference, &config).unwrap();
    assert_eq!(a.primary(), b.primary());
}

// ---------------------------------------------------------------------------
// 7. qdm_transfers_quantile_change_of_seasonal_scenario
// ---------------------------------------------------------------------------
#[test]
fn qdm_transfers_quantile_change_of_seasonal_scenario() {
    let hist = seasonal_with_trend(23);
    let future_dates =
        noleap_sequence(NaiveDate::from_ymd_opt(2040, 1, 1).unwrap(), N_YEARS * 365);
    let reference = Series::new(future_dates, reference_of(&hist).values().to_vec())
        .unwrap()
        .with_units("C");

    let trained = train(&hist, &reference, &monthly_config()).unwrap();
    let set = trained.primary();
    for m in 1..=12u8 {
        let group = set.group(GroupKey::Month(m)).unwrap();
        for (p, f) in set.nodes().iter().zip(&group.factor) {
            assert_relative_eq!(*f, expected_factor(*p, m), epsilon = 1e-9);
        }
    }

    // The target is the historical data itself.
    let config = AdjustConfig::new()
        .with_method(AdjustMethod::Qdm)
        .with_interpolation(Interpolation::Nearest)
        .with_ref_time(true);
    let adjusted = adjust(&hist, set, &config).unwrap();
    assert_eq!(adjusted.series().start(), reference.start());
    assert_eq!(adjusted.series().end(), reference.end());

    let nodes = equally_spaced_nodes(100);
    let qq_q = estimate_quantiles(adjusted.series(), &nodes, &Grouping::Monthly).unwrap();
    let ref_q = estimate_quantiles(&reference, &nodes, &Grouping::Monthly).unwrap();
    for m in 1..=12u8 {
        let key = GroupKey::Month(m);
        let hist_q = &set.group(key).unwrap().hist_q;
        let qq = qq_q.get(key).unwrap();
        let future = ref_q.get(key).unwrap();
        for node in 0..nodes.len() {
            let qq_change = qq[node] - hist_q[node];
            let model_change = future[node] - hist_q[node];
            assert_relative_eq!(qq_change, model_change, epsilon = 1e-6);
        }
    }
}
