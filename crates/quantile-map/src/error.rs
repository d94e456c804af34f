//! Error types for the qqscale-quantile-map crate.

use qqscale_calendar::CalendarError;

use crate::grouping::GroupKey;

/// Error type for all fallible operations in the qqscale-quantile-map crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuantileMapError {
    /// Returned when an input has no usable values.
    #[error("no data: {context}")]
    EmptyData {
        /// What was empty.
        context: String,
    },

    /// Returned when the dates and values of a series differ in length.
    #[error("length mismatch: {dates_len} dates but {values_len} values")]
    LengthMismatch {
        /// Number of dates.
        dates_len: usize,
        /// Number of values.
        values_len: usize,
    },

    /// Returned when series dates are not strictly increasing.
    #[error("dates must be strictly increasing (violated at index {index})")]
    UnsortedDates {
        /// Index of the first date that is not after its predecessor.
        index: usize,
    },

    /// Returned when a configuration parameter is invalid.
    #[error("invalid configuration for {parameter}: {reason}")]
    InvalidConfig {
        /// Name of the offending parameter.
        parameter: String,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when two inputs carry incompatible units.
    #[error("unit mismatch in {context}: expected units {expected}, got {got}")]
    UnitMismatch {
        /// Which inputs were compared.
        context: String,
        /// Units that were required.
        expected: String,
        /// Units that were found.
        got: String,
    },

    /// Returned when spatial grids differ and cannot be conformed.
    #[error("grid mismatch: expected {expected}, got {got}")]
    GridMismatch {
        /// Description of the expected grid.
        expected: String,
        /// Description of the grid that was found.
        got: String,
    },

    /// Returned when a historical quantile is zero under multiplicative
    /// scaling and the degenerate policy is `Error`.
    #[error(
        "historical quantile is zero for group {group} at probability {probability} (multiplicative factor undefined)"
    )]
    DegenerateQuantile {
        /// Group in which the zero quantile occurred.
        group: GroupKey,
        /// Probability node of the zero quantile.
        probability: f64,
    },

    /// Returned when a climatology used as a divisor is zero.
    #[error("{which} climatology is zero for group {group}")]
    DegenerateClimatology {
        /// Group in which the zero climatology occurred.
        group: GroupKey,
        /// Which input the climatology belongs to.
        which: String,
    },

    /// Returned when a value falls into a group with no trained factors.
    #[error("no adjustment factors for group {group}")]
    MissingGroup {
        /// The group without factors.
        group: GroupKey,
    },

    /// Returned when a grid cell has no factor set at all.
    #[error("no adjustment factors for cell {index}")]
    MissingFactors {
        /// Row-major index of the cell.
        index: usize,
    },

    /// Returned when processing one grid cell fails.
    #[error("cell {index} (lat {lat}, lon {lon}) failed: {source}")]
    Partition {
        /// Row-major index of the cell.
        index: usize,
        /// Latitude of the cell.
        lat: f64,
        /// Longitude of the cell.
        lon: f64,
        /// The underlying failure.
        source: Box<QuantileMapError>,
    },

    /// Propagated calendar error.
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

impl QuantileMapError {
    pub(crate) fn config(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}
