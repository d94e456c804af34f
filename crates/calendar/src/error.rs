//! Error types for the qqscale-calendar crate.

/// Error type for all fallible operations in the qqscale-calendar crate.
///
/// Covers out-of-range day-of-year values and unparseable date strings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum CalendarError {
    /// Returned when a day-of-year value is outside the valid range 1..=365.
    #[error("invalid day of year: {doy} (must be 1..=365)")]
    InvalidDoy {
        /// The invalid day-of-year value that was provided.
        doy: u16,
    },

    /// Returned when a date string is not a valid `YYYY-MM-DD` date.
    #[error("invalid date '{input}' (expected YYYY-MM-DD)")]
    InvalidDate {
        /// The string that failed to parse.
        input: String,
    },
}
