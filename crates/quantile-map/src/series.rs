//! Dated series, grid geometry and fields of series sharing a time axis.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::QuantileMapError;

/// Geographic position of a single series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees north.
    pub lat: f64,
    /// Longitude in degrees east.
    pub lon: f64,
}

/// A daily series: strictly increasing dates with one value each.
///
/// Missing values are `NaN`. All transformations return a new `Series`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use qqscale_quantile_map::Series;
///
/// let d0 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
/// let dates = vec![d0, d0.succ_opt().unwrap()];
/// let s = Series::new(dates, vec![1.0, f64::NAN])?
///     .with_units("mm d-1");
/// assert_eq!(s.len(), 2);
/// # Ok::<(), qqscale_quantile_map::QuantileMapError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    units: Option<String>,
    location: Option<Location>,
}

impl Series {
    /// Creates a series after checking lengths and date order.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`QuantileMapError::LengthMismatch`] | `dates.len() != values.len()` |
    /// | [`QuantileMapError::UnsortedDates`] | a date is not after its predecessor |
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, QuantileMapError> {
        if dates.len() != values.len() {
            return Err(QuantileMapError::LengthMismatch {
                dates_len: dates.len(),
                values_len: values.len(),
            });
        }
        if let Some(i) = dates.windows(2).position(|w| w[1] <= w[0]) {
            return Err(QuantileMapError::UnsortedDates { index: i + 1 });
        }
        Ok(Self {
            dates,
            values,
            units: None,
            location: None,
        })
    }

    /// Sets the units label.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Sets or clears the units label.
    pub fn with_units_opt(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First date, if any.
    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Last date, if any.
    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Iterates over `(date, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Same dates and metadata with new values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != self.len()`.
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.len(), "with_values: length changed");
        Self {
            dates: self.dates.clone(),
            values,
            units: self.units.clone(),
            location: self.location,
        }
    }

    /// Applies `f` to every value.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        self.with_values(self.values.iter().map(|&v| f(v)).collect())
    }

    /// Series with every date moved by `offset`.
    pub fn shifted(&self, offset: TimeDelta) -> Self {
        Self {
            dates: self.dates.iter().map(|&d| d + offset).collect(),
            ..self.clone()
        }
    }

    /// Entries with `start <= date <= end`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let lo = self.dates.partition_point(|&d| d < start);
        let hi = self.dates.partition_point(|&d| d <= end).max(lo);
        Self {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
            units: self.units.clone(),
            location: self.location,
        }
    }
}

/// A rectilinear latitude/longitude grid. Cells are numbered row-major,
/// latitude first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl Grid {
    /// # Errors
    ///
    /// [`QuantileMapError::InvalidConfig`] if either axis is empty or
    /// contains non-finite coordinates.
    pub fn new(lats: Vec<f64>, lons: Vec<f64>) -> Result<Self, QuantileMapError> {
        for (name, axis) in [("lats", &lats), ("lons", &lons)] {
            if axis.is_empty() {
                return Err(QuantileMapError::config(name, "grid axis must not be empty"));
            }
            if axis.iter().any(|v| !v.is_finite()) {
                return Err(QuantileMapError::config(name, "grid coordinates must be finite"));
            }
        }
        Ok(Self { lats, lons })
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(lat, lon)` of cell `index`.
    pub fn coords(&self, index: usize) -> (f64, f64) {
        let n_lon = self.lons.len();
        (self.lats[index / n_lon], self.lons[index % n_lon])
    }

    /// Short `lats x lons` description used in error messages.
    pub fn describe(&self) -> String {
        format!("{}x{} grid", self.lats.len(), self.lons.len())
    }
}

pub(crate) fn describe_grid(grid: Option<&Grid>) -> String {
    grid.map_or_else(|| "single point".to_string(), Grid::describe)
}

/// Series that share one time axis: a single point or every cell of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    grid: Option<Grid>,
    cells: Vec<Series>,
}

impl Field {
    /// A field holding one series.
    pub fn point(series: Series) -> Self {
        Self {
            grid: None,
            cells: vec![series],
        }
    }

    /// A gridded field.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`QuantileMapError::GridMismatch`] | `cells.len() != grid.len()` |
    /// | [`QuantileMapError::InvalidConfig`] | cells disagree on dates |
    pub fn gridded(grid: Grid, cells: Vec<Series>) -> Result<Self, QuantileMapError> {
        if cells.len() != grid.len() {
            return Err(QuantileMapError::GridMismatch {
                expected: format!("{} cells for {}", grid.len(), grid.describe()),
                got: format!("{} cells", cells.len()),
            });
        }
        if let Some(first) = cells.first() {
            if let Some(i) = cells.iter().position(|c| c.dates() != first.dates()) {
                return Err(QuantileMapError::config(
                    "cells",
                    format!("cell {i} does not share the time axis of cell 0"),
                ));
            }
        }
        Ok(Self {
            grid: Some(grid),
            cells,
        })
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn cells(&self) -> &[Series] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Series> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Shared time axis.
    pub fn dates(&self) -> &[NaiveDate] {
        self.cells.first().map_or(&[], |c| c.dates())
    }

    /// Units of the first cell.
    pub fn units(&self) -> Option<&str> {
        self.cells.first().and_then(Series::units)
    }

    /// Sets the units label of every cell.
    pub fn with_units(self, units: &str) -> Self {
        Self {
            grid: self.grid,
            cells: self.cells.into_iter().map(|c| c.with_units(units)).collect(),
        }
    }

    /// `(lat, lon)` of every cell. Point fields use the series location, or
    /// `NaN` when none is set.
    pub fn coords(&self) -> Vec<(f64, f64)> {
        match &self.grid {
            Some(grid) => (0..grid.len()).map(|i| grid.coords(i)).collect(),
            None => self
                .cells
                .iter()
                .map(|c| c.location().map_or((f64::NAN, f64::NAN), |l| (l.lat, l.lon)))
                .collect(),
        }
    }

    /// Rebuilds a field on the same grid from per-cell series.
    pub(crate) fn with_cells(grid: Option<Grid>, cells: Vec<Series>) -> Result<Self, QuantileMapError> {
        match grid {
            Some(grid) => Self::gridded(grid, cells),
            None => Ok(Self { grid: None, cells }),
        }
    }
}
