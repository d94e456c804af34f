//! Day-of-year newtype for the 365-day no-leap calendar.

use chrono::{Datelike, NaiveDate};

use crate::error::CalendarError;

/// Length of the no-leap cycle.
pub const DAYS_IN_YEAR: u16 = 365;

/// Day of year of February 28, the slot February 29 folds onto.
const FEB_28: u16 = 59;

/// Day-of-year in the 365-day no-leap calendar (1..=365).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Doy(u16);

impl Doy {
    /// Creates a new `Doy` from a day-of-year value.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidDoy`] if `doy` is not in 1..=365.
    pub fn new(doy: u16) -> Result<Self, CalendarError> {
        if !(1..=DAYS_IN_YEAR).contains(&doy) {
            return Err(CalendarError::InvalidDoy { doy });
        }
        Ok(Self(doy))
    }

    /// Maps a calendar date onto the no-leap cycle.
    ///
    /// February 29 shares doy 59 with February 28; every later day of a leap
    /// year keeps the slot of the same (month, day) in a common year.
    pub fn from_date(date: NaiveDate) -> Self {
        let ordinal = date.ordinal() as u16;
        let leap = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some();
        if leap && ordinal > FEB_28 {
            Self(ordinal - 1)
        } else {
            Self(ordinal)
        }
    }

    /// Returns the inner day-of-year value (1..=365).
    pub fn get(self) -> u16 {
        self.0
    }

    /// Returns the month (1..=12) of this day in a common year.
    pub fn month(self) -> u8 {
        // 2001 is a common year, so every doy in 1..=365 is a valid ordinal.
        NaiveDate::from_yo_opt(2001, u32::from(self.0)).map_or(12, |d| d.month() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid() {
        assert_eq!(Doy::new(1).unwrap().get(), 1);
        assert_eq!(Doy::new(365).unwrap().get(), 365);
    }

    #[test]
    fn new_invalid() {
        assert_eq!(Doy::new(0).unwrap_err(), CalendarError::InvalidDoy { doy: 0 });
        assert_eq!(Doy::new(366).unwrap_err(), CalendarError::InvalidDoy { doy: 366 });
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(Doy::new(31).unwrap().month(), 1);
        assert_eq!(Doy::new(32).unwrap().month(), 2);
        assert_eq!(Doy::new(59).unwrap().month(), 2);
        assert_eq!(Doy::new(60).unwrap().month(), 3);
        assert_eq!(Doy::new(365).unwrap().month(), 12);
    }

    #[test]
    fn from_date_common_year() {
        let date = NaiveDate::from_ymd_opt(2001, 3, 1).unwrap();
        assert_eq!(Doy::from_date(date).get(), 60);
        let date = NaiveDate::from_ymd_opt(2001, 12, 31).unwrap();
        assert_eq!(Doy::from_date(date).get(), 365);
    }

    #[test]
    fn from_date_leap_year() {
        let feb28 = NaiveDate::from_ymd_opt(2000, 2, 28).unwrap();
        let feb29 = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        let mar1 = NaiveDate::from_ymd_opt(2000, 3, 1).unwrap();
        let dec31 = NaiveDate::from_ymd_opt(2000, 12, 31).unwrap();
        assert_eq!(Doy::from_date(feb28).get(), 59);
        assert_eq!(Doy::from_date(feb29).get(), 59);
        assert_eq!(Doy::from_date(mar1).get(), 60);
        assert_eq!(Doy::from_date(dec31).get(), 365);
    }

    #[test]
    fn ordered() {
        assert!(Doy::new(1).unwrap() < Doy::new(365).unwrap());
    }
}
