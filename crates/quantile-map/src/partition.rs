//! Parallel execution over grid cells.
//!
//! Cells are independent: each closure call sees one cell index and shares
//! no mutable state with the others. Results are gathered in cell order, so
//! the outcome does not depend on thread scheduling.

use rayon::prelude::*;
use tracing::{debug_span, warn};

use crate::config::FailurePolicy;
use crate::error::QuantileMapError;
use crate::series::{Field, Series};

/// A cell that failed under [`FailurePolicy::MarkMissing`].
#[derive(Debug, Clone)]
pub struct FailedCell {
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
    pub error: QuantileMapError,
}

/// Per-cell results of a partitioned run. `None` entries correspond to
/// cells listed in [`PartitionOutcome::failed`].
#[derive(Debug, Clone)]
pub struct PartitionOutcome<T> {
    pub results: Vec<Option<T>>,
    pub failed: Vec<FailedCell>,
}

/// Runs `f` for every cell index in parallel.
///
/// `coords` gives the `(lat, lon)` of each cell for error reporting.
///
/// # Errors
///
/// Under [`FailurePolicy::Abort`] the failure of the lowest-indexed failing
/// cell, wrapped in [`QuantileMapError::Partition`].
pub(crate) fn run_cells<T, F>(
    coords: &[(f64, f64)],
    policy: FailurePolicy,
    f: F,
) -> Result<PartitionOutcome<T>, QuantileMapError>
where
    T: Send,
    F: Fn(usize) -> Result<T, QuantileMapError> + Sync,
{
    let raw: Vec<Result<T, QuantileMapError>> = (0..coords.len())
        .into_par_iter()
        .map(|i| {
            let _span = debug_span!("cell", index = i).entered();
            f(i)
        })
        .collect();

    let mut results = Vec::with_capacity(raw.len());
    let mut failed = Vec::new();
    for (i, r) in raw.into_iter().enumerate() {
        match r {
            Ok(v) => results.push(Some(v)),
            Err(error) => {
                let (lat, lon) = coords[i];
                match policy {
                    FailurePolicy::Abort => {
                        return Err(QuantileMapError::Partition {
                            index: i,
                            lat,
                            lon,
                            source: Box::new(error),
                        });
                    }
                    FailurePolicy::MarkMissing => {
                        warn!(index = i, lat, lon, %error, "cell failed, marking missing");
                        results.push(None);
                        failed.push(FailedCell {
                            index: i,
                            lat,
                            lon,
                            error,
                        });
                    }
                }
            }
        }
    }

    Ok(PartitionOutcome { results, failed })
}

/// Applies `f` to every cell of `field` in parallel.
///
/// # Errors
///
/// See [`FailurePolicy`]; under `Abort` the first failure is returned as
/// [`QuantileMapError::Partition`].
pub fn map_cells<T, F>(
    field: &Field,
    policy: FailurePolicy,
    f: F,
) -> Result<PartitionOutcome<T>, QuantileMapError>
where
    T: Send,
    F: Fn(usize, &Series) -> Result<T, QuantileMapError> + Sync,
{
    run_cells(&field.coords(), policy, |i| f(i, &field.cells()[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(n: usize) -> Vec<(f64, f64)> {
        (0..n).map(|i| (i as f64, -(i as f64))).collect()
    }

    fn fail_odd(i: usize) -> Result<usize, QuantileMapError> {
        if i % 2 == 1 {
            Err(QuantileMapError::MissingFactors { index: i })
        } else {
            Ok(i * 10)
        }
    }

    #[test]
    fn results_in_cell_order() {
        let out = run_cells(&coords(50), FailurePolicy::Abort, |i| Ok(i * 2)).unwrap();
        assert!(out.failed.is_empty());
        assert_eq!(out.results[49], Some(98));
    }

    #[test]
    fn abort_reports_lowest_failing_cell() {
        let err = run_cells(&coords(8), FailurePolicy::Abort, fail_odd).unwrap_err();
        match err {
            QuantileMapError::Partition { index, lat, lon, .. } => {
                assert_eq!(index, 1);
                assert_eq!((lat, lon), (1.0, -1.0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mark_missing_lists_failures() {
        let out = run_cells(&coords(5), FailurePolicy::MarkMissing, fail_odd).unwrap();
        assert_eq!(out.results, vec![Some(0), None, Some(20), None, Some(40)]);
        let failed: Vec<usize> = out.failed.iter().map(|c| c.index).collect();
        assert_eq!(failed, vec![1, 3]);
    }
}
