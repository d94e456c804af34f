//! High-level Parquet reader configuration and orchestration.

use std::path::Path;

use chrono::NaiveDate;
use qqscale_calendar::is_leap_day;
use qqscale_quantile_map::{Field, Grid, Location, Series};
use tracing::{debug, info};

use crate::error::IoError;
use crate::parquet_read::{self, Row};
use crate::units::convert_units;
use crate::validate::validate_time_axes;

// ---------------------------------------------------------------------------
// ReaderConfig
// ---------------------------------------------------------------------------

/// Configuration for reading one variable from a Parquet long table.
///
/// The table has a `time` column (`Date32`), the variable column
/// (`Float64`), and optionally `lat`/`lon` columns (`Float64`) for gridded
/// data. The variable's units come from the `units` metadata key.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Column holding the variable.
    variable: String,
    /// Inclusive time bounds.
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    /// Overrides the units recorded in the file.
    input_units: Option<String>,
    /// Units to convert to after reading.
    output_units: Option<String>,
    /// Drop February 29.
    drop_leap_days: bool,
}

impl ReaderConfig {
    /// Reads `variable` with no time bounds, no unit handling and leap days kept.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            start: None,
            end: None,
            input_units: None,
            output_units: None,
            drop_leap_days: false,
        }
    }

    /// Restricts rows to `start..=end`; either bound may be open.
    pub fn with_time_bounds(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_input_units(mut self, units: Option<String>) -> Self {
        self.input_units = units;
        self
    }

    pub fn with_output_units(mut self, units: Option<String>) -> Self {
        self.output_units = units;
        self
    }

    pub fn with_drop_leap_days(mut self, drop: bool) -> Self {
        self.drop_leap_days = drop;
        self
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn output_units(&self) -> Option<&str> {
        self.output_units.as_deref()
    }

    /// Validate that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] if the variable name is empty or the
    /// time bounds are reversed.
    pub fn validate(&self) -> Result<(), IoError> {
        if self.variable.is_empty() {
            return Err(IoError::Validation {
                count: 1,
                details: "variable name must not be empty".to_string(),
            });
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(IoError::Validation {
                    count: 1,
                    details: format!("time bounds reversed: {start} > {end}"),
                });
            }
        }
        Ok(())
    }

    fn keeps(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s)
            && self.end.is_none_or(|e| date <= e)
            && !(self.drop_leap_days && is_leap_day(date))
    }
}

// ---------------------------------------------------------------------------
// read_field
// ---------------------------------------------------------------------------

/// Sorted distinct values of `xs`.
fn axis(xs: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = xs.collect();
    v.sort_by(f64::total_cmp);
    v.dedup();
    v
}

fn position(axis: &[f64], x: f64) -> usize {
    axis.binary_search_by(|a| a.total_cmp(&x)).unwrap_or(0)
}

/// Read one variable from a Parquet long table.
///
/// Without coordinate columns the result is a point field; with them, a
/// gridded field whose axes are the distinct `lat` and `lon` values. Every
/// grid cell must have the same dates.
///
/// # Errors
///
/// Returns [`IoError`] on missing columns, schema or time-axis validation
/// problems, or incompatible units.
pub fn read_field(path: &Path, config: &ReaderConfig) -> Result<Field, IoError> {
    config.validate()?;

    let (batches, schema) = parquet_read::read_batches(path)?;
    let layout = parquet_read::inspect_schema(&schema, &config.variable, path)?;
    let rows: Vec<Row> = parquet_read::extract_rows(&batches, &config.variable, layout.has_coords)?
        .into_iter()
        .filter(|r| config.keeps(r.date))
        .collect();
    if rows.is_empty() {
        return Err(IoError::Validation {
            count: 1,
            details: format!(
                "no rows of '{}' in {} within the requested bounds",
                config.variable,
                path.display()
            ),
        });
    }

    let units = config.input_units.clone().or(layout.units);
    match (&units, &config.output_units) {
        (None, Some(to)) => {
            return Err(IoError::Validation {
                count: 1,
                details: format!(
                    "cannot convert '{}' to {to}: units unknown (set input units)",
                    config.variable
                ),
            });
        }
        (None, None) => debug!(variable = %config.variable, "no units recorded"),
        _ => {}
    }

    let grid = if layout.has_coords {
        Some(Grid::new(axis(rows.iter().map(|r| r.lat)), axis(rows.iter().map(|r| r.lon)))?)
    } else {
        None
    };

    let n_cells = grid.as_ref().map_or(1, Grid::len);
    let mut cells: Vec<Vec<(NaiveDate, f64)>> = vec![Vec::new(); n_cells];
    for r in &rows {
        let i = match &grid {
            Some(g) => position(g.lats(), r.lat) * g.lons().len() + position(g.lons(), r.lon),
            None => 0,
        };
        cells[i].push((r.date, r.value));
    }
    for cell in &mut cells {
        cell.sort_by_key(|(d, _)| *d);
    }
    let coords: Vec<(f64, f64)> = match &grid {
        Some(g) => (0..g.len()).map(|i| g.coords(i)).collect(),
        None => vec![(f64::NAN, f64::NAN)],
    };
    validate_time_axes(&cells, &coords).finish()?;

    let series = cells
        .into_iter()
        .zip(&coords)
        .map(|(cell, &(lat, lon))| {
            let (dates, values): (Vec<NaiveDate>, Vec<f64>) = cell.into_iter().unzip();
            let (values, units) = match (&units, &config.output_units) {
                (Some(from), Some(to)) => (convert_units(&values, from, to)?, Some(to.clone())),
                _ => (values, units.clone()),
            };
            let s = Series::new(dates, values)?.with_units_opt(units);
            Ok(if grid.is_some() { s.with_location(Location { lat, lon }) } else { s })
        })
        .collect::<Result<Vec<_>, IoError>>()?;

    let field = match grid {
        Some(g) => Field::gridded(g, series)?,
        None => series
            .into_iter()
            .next()
            .map(Field::point)
            .ok_or_else(|| IoError::Validation {
                count: 1,
                details: "no series read".to_string(),
            })?,
    };
    info!(
        path = %path.display(),
        variable = %config.variable,
        cells = field.len(),
        days = field.dates().len(),
        "read field"
    );
    Ok(field)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
