//! No-leap date sequence generation.

use chrono::NaiveDate;

use crate::date::is_leap_day;

/// Generates `n_days` consecutive dates starting at `start`, skipping
/// February 29.
///
/// The result has exactly 365 dates per year, matching the no-leap calendar
/// used by many climate models. A `start` that is itself February 29 is kept
/// as the first element. The sequence stops early only if the end of
/// chrono's representable range is reached.
///
/// # Example
///
/// ```ignore
/// let start = NaiveDate::from_ymd_opt(2000, 2, 28).unwrap();
/// let dates = noleap_sequence(start, 2);
/// // Feb 28, Mar 1
/// ```
pub fn noleap_sequence(start: NaiveDate, n_days: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n_days);
    if n_days == 0 {
        return dates;
    }
    dates.push(start);
    let mut current = start;
    while dates.len() < n_days {
        let Some(next) = current.succ_opt() else {
            break;
        };
        current = next;
        if !is_leap_day(current) {
            dates.push(current);
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty() {
        assert!(noleap_sequence(ymd(2000, 1, 1), 0).is_empty());
    }

    #[test]
    fn single() {
        let dates = noleap_sequence(ymd(2000, 6, 15), 1);
        assert_eq!(dates, vec![ymd(2000, 6, 15)]);
    }

    #[test]
    fn skips_leap_day() {
        let dates = noleap_sequence(ymd(2000, 2, 28), 2);
        assert_eq!(dates, vec![ymd(2000, 2, 28), ymd(2000, 3, 1)]);
    }

    #[test]
    fn leap_year_has_365_days() {
        let dates = noleap_sequence(ymd(2000, 1, 1), 365);
        assert_eq!(*dates.last().unwrap(), ymd(2000, 12, 31));
    }

    #[test]
    fn multi_year() {
        let dates = noleap_sequence(ymd(2000, 1, 1), 730);
        assert_eq!(dates.len(), 730);
        assert_eq!(dates[365], ymd(2001, 1, 1));
        assert!(dates.iter().all(|d| !(d.month() == 2 && d.day() == 29)));
    }

    #[test]
    fn strictly_increasing() {
        let dates = noleap_sequence(ymd(1999, 12, 1), 500);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }
}
