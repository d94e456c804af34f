//! Clipping adjusted data against a field of maximum valid values.

use std::borrow::Cow;

use tracing::{debug, info};

use crate::error::QuantileMapError;
use crate::regrid::{Regridder, regrid_field};
use crate::series::{Field, describe_grid};

/// Caps every value of `data` at the matching value of `max`.
///
/// `max` is regridded onto the grid of `data` when the two differ. Its time
/// axis is not compared: it must have as many steps as `data`, which are
/// paired in order, or a single step that caps every date. A `NaN` on either
/// side gives `NaN`.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`QuantileMapError::UnitMismatch`] | both fields carry units and they differ |
/// | [`QuantileMapError::GridMismatch`] | grids differ and no regridder is given, or regridding fails |
/// | [`QuantileMapError::InvalidConfig`] | `max` has neither one step nor as many as `data` |
pub fn clip_to_max_field(
    data: &Field,
    max: &Field,
    regridder: Option<&dyn Regridder>,
) -> Result<Field, QuantileMapError> {
    if let (Some(expected), Some(got)) = (data.units(), max.units()) {
        if expected != got {
            return Err(QuantileMapError::UnitMismatch {
                context: "maximum values vs data".to_string(),
                expected: expected.to_string(),
                got: got.to_string(),
            });
        }
    }

    let max: Cow<'_, Field> = if data.grid() == max.grid() {
        Cow::Borrowed(max)
    } else {
        match (data.grid(), max.grid(), regridder) {
            (Some(grid), Some(_), Some(regridder)) => {
                info!("regridding maximum values to the data grid");
                Cow::Owned(regrid_field(max, grid, regridder)?)
            }
            _ => {
                return Err(QuantileMapError::GridMismatch {
                    expected: describe_grid(data.grid()),
                    got: describe_grid(max.grid()),
                });
            }
        }
    };
    if max.len() != data.len() {
        return Err(QuantileMapError::GridMismatch {
            expected: format!("{} cells", data.len()),
            got: format!("{} cells", max.len()),
        });
    }

    let (n_data, n_max) = (data.dates().len(), max.dates().len());
    if n_max != n_data && n_max != 1 {
        return Err(QuantileMapError::config(
            "max",
            format!("maximum field has {n_max} time steps, data has {n_data}"),
        ));
    }

    let mut clipped = 0usize;
    let cells: Vec<_> = data
        .cells()
        .iter()
        .zip(max.cells())
        .map(|(cell, limit)| {
            let limits = limit.values();
            let values = cell
                .values()
                .iter()
                .enumerate()
                .map(|(t, &v)| {
                    let m = limits[if n_max == 1 { 0 } else { t }];
                    if v.is_nan() || m.is_nan() {
                        f64::NAN
                    } else if v > m {
                        clipped += 1;
                        m
                    } else {
                        v
                    }
                })
                .collect();
            cell.with_values(values)
        })
        .collect();
    debug!(clipped, "values capped at the maximum field");

    Field::with_cells(data.grid().cloned(), cells)
}
