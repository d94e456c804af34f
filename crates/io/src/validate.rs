//! Accumulated validation utilities.
//!
//! Provides [`ValidationCollector`] for gathering multiple validation errors
//! into a single [`IoError::Validation`], plus the checks applied to the
//! cells of a long table before they become series.

use chrono::NaiveDate;

use crate::error::IoError;

/// Maximum number of messages kept verbatim; the rest are only counted.
const MAX_MESSAGES: usize = 10;

// ---------------------------------------------------------------------------
// ValidationCollector
// ---------------------------------------------------------------------------

/// Accumulates validation errors and converts them into a single
/// [`IoError::Validation`].
///
/// Create a collector, push zero or more error messages, then call
/// [`finish`](Self::finish) to obtain `Ok(())` when everything is valid or a
/// single `Err` that summarises every violation.
pub(crate) struct ValidationCollector {
    errors: Vec<String>,
    count: usize,
}

impl ValidationCollector {
    pub(crate) fn new() -> Self {
        Self {
            errors: Vec::new(),
            count: 0,
        }
    }

    /// Record one validation error.
    pub(crate) fn push(&mut self, msg: impl Into<String>) {
        self.count += 1;
        if self.errors.len() < MAX_MESSAGES {
            self.errors.push(msg.into());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Consume the collector and return `Ok(())` if no errors were recorded,
    /// or `Err(IoError::Validation { count, details })` otherwise.
    ///
    /// The `details` string joins the kept messages with `"; "`.
    pub(crate) fn finish(self) -> Result<(), IoError> {
        if self.count == 0 {
            return Ok(());
        }
        let mut details = self.errors.join("; ");
        if self.count > self.errors.len() {
            details.push_str(&format!("; and {} more", self.count - self.errors.len()));
        }
        Err(IoError::Validation {
            count: self.count,
            details,
        })
    }
}

// ---------------------------------------------------------------------------
// Cell checks
// ---------------------------------------------------------------------------

/// Checks that every cell has rows, no date twice, and the time axis of the
/// first cell. `cells` must be sorted by date; `coords` labels each cell.
pub(crate) fn validate_time_axes(
    cells: &[Vec<(NaiveDate, f64)>],
    coords: &[(f64, f64)],
) -> ValidationCollector {
    let mut c = ValidationCollector::new();
    let reference: Vec<NaiveDate> = cells
        .first()
        .map(|cell| cell.iter().map(|(d, _)| *d).collect())
        .unwrap_or_default();

    for (cell, &(lat, lon)) in cells.iter().zip(coords) {
        if cell.is_empty() {
            c.push(format!("no rows for cell ({lat}, {lon})"));
            continue;
        }
        if let Some(w) = cell.windows(2).find(|w| w[0].0 == w[1].0) {
            c.push(format!("duplicate date {} in cell ({lat}, {lon})", w[0].0));
            continue;
        }
        let same_axis = cell.len() == reference.len()
            && cell.iter().zip(&reference).all(|((d, _), r)| d == r);
        if !same_axis {
            c.push(format!(
                "cell ({lat}, {lon}) has {} dates, not the time axis of the first cell ({} dates)",
                cell.len(),
                reference.len()
            ));
        }
    }

    c
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
