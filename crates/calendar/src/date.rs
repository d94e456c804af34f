//! Date parsing, formatting and leap-day helpers.

use chrono::{Datelike, NaiveDate};

use crate::error::CalendarError;

/// Format used for dates in configuration files and persisted provenance.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date string.
///
/// # Errors
///
/// Returns [`CalendarError::InvalidDate`] if the string is not a valid
/// Gregorian date in that format.
pub fn parse_date(input: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| CalendarError::InvalidDate {
        input: input.to_string(),
    })
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Returns `true` for February 29.
pub fn is_leap_day(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == 29
}

/// Returns the calendar month (1..=12) of `date`.
pub fn month_of(date: NaiveDate) -> u8 {
    date.month() as u8
}
