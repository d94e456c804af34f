//! Singularity stochastic removal for zero-inflated variables.
//!
//! Values below a small threshold are replaced by random draws in
//! `(0, threshold]` so that the many exact zeros of a precipitation record do
//! not pile up on one quantile. [`reverse_ssr`] sets everything below the
//! threshold back to exactly zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::QuantileMapError;
use crate::series::{Field, Series};

/// Default SSR threshold in mm/day (1e-8 kg m-2 s-1).
pub const DEFAULT_SSR_THRESHOLD: f64 = 8.64e-4;

fn check_threshold(threshold: f64) -> Result<(), QuantileMapError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(QuantileMapError::config(
            "ssr_threshold",
            format!("must be finite and > 0, got {threshold}"),
        ));
    }
    Ok(())
}

/// Replaces every value below `threshold` by an independent uniform draw in
/// `(0, threshold]`. Values at or above the threshold and `NaN` are kept.
///
/// # Errors
///
/// [`QuantileMapError::InvalidConfig`] if `threshold` is not finite and positive.
pub fn apply_ssr<R: Rng>(
    values: &[f64],
    threshold: f64,
    rng: &mut R,
) -> Result<Vec<f64>, QuantileMapError> {
    check_threshold(threshold)?;
    Ok(values
        .iter()
        .map(|&v| {
            if v < threshold {
                (1.0 - rng.random::<f64>()) * threshold
            } else {
                v
            }
        })
        .collect())
}

/// Sets every value below `threshold` to exactly zero.
///
/// # Errors
///
/// [`QuantileMapError::InvalidConfig`] if `threshold` is not finite and positive.
pub fn reverse_ssr(values: &[f64], threshold: f64) -> Result<Vec<f64>, QuantileMapError> {
    check_threshold(threshold)?;
    Ok(values
        .iter()
        .map(|&v| if v < threshold { 0.0 } else { v })
        .collect())
}

/// Applies [`apply_ssr`] to every cell of `field`. Cell `i` draws from an RNG
/// seeded with `seed + i`.
pub fn apply_ssr_field(field: &Field, threshold: f64, seed: u64) -> Result<Field, QuantileMapError> {
    let cells = field
        .cells()
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            Ok(cell.with_values(apply_ssr(cell.values(), threshold, &mut rng)?))
        })
        .collect::<Result<Vec<Series>, QuantileMapError>>()?;
    Field::with_cells(field.grid().cloned(), cells)
}

/// Applies [`reverse_ssr`] to every cell of `field`.
pub fn reverse_ssr_field(field: &Field, threshold: f64) -> Result<Field, QuantileMapError> {
    let cells = field
        .cells()
        .iter()
        .map(|cell| Ok(cell.with_values(reverse_ssr(cell.values(), threshold)?)))
        .collect::<Result<Vec<Series>, QuantileMapError>>()?;
    Field::with_cells(field.grid().cloned(), cells)
}
