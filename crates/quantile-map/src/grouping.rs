//! Temporal grouping of dates into months, day-of-year windows or one group.
//!
//! Training uses [`Grouping::memberships`], where a windowed grouping lets one
//! date contribute to several overlapping groups. Adjustment uses
//! [`Grouping::main_group`], the single group named after the date itself.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use qqscale_calendar::{DAYS_IN_YEAR, Doy, circular_window, month_of};
use serde::{Deserialize, Serialize};

use crate::error::QuantileMapError;

const MONTHS_IN_YEAR: u16 = 12;

/// Unit of the moving window in [`Grouping::Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowUnit {
    /// Calendar months on the 12-month cycle.
    Month,
    /// Days of the 365-day no-leap cycle.
    DayOfYear,
}

/// How dates are partitioned into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grouping {
    /// Every date belongs to one group.
    #[default]
    None,
    /// One group per calendar month.
    Monthly,
    /// Overlapping centred windows of `size` units (odd).
    Window {
        /// Unit of the window.
        unit: WindowUnit,
        /// Total window width, including the centre.
        size: u16,
    },
}

/// Label of one temporal group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupKey {
    /// The single group of [`Grouping::None`].
    All,
    /// Calendar month, 1..=12.
    Month(u8),
    /// No-leap day of year, 1..=365.
    DayOfYear(u16),
}

impl Grouping {
    /// Builds a windowed grouping after checking the window size.
    ///
    /// # Errors
    ///
    /// [`QuantileMapError::InvalidConfig`] if `size` is even, zero, or wider
    /// than the cycle.
    pub fn window(unit: WindowUnit, size: u16) -> Result<Self, QuantileMapError> {
        let grouping = Self::Window { unit, size };
        grouping.validate()?;
        Ok(grouping)
    }

    /// Checks window sizes of [`Grouping::Window`]; other variants are always valid.
    pub fn validate(&self) -> Result<(), QuantileMapError> {
        if let Self::Window { unit, size } = *self {
            let period = match unit {
                WindowUnit::Month => MONTHS_IN_YEAR,
                WindowUnit::DayOfYear => DAYS_IN_YEAR,
            };
            if size == 0 || size % 2 == 0 || size > period {
                return Err(QuantileMapError::config(
                    "grouping",
                    format!("window size must be odd and in 1..={period}, got {size}"),
                ));
            }
        }
        Ok(())
    }

    /// Every group `date` contributes to during training.
    pub fn memberships(&self, date: NaiveDate) -> Vec<GroupKey> {
        match *self {
            Self::None => vec![GroupKey::All],
            Self::Monthly => vec![GroupKey::Month(month_of(date))],
            Self::Window { unit, size } => {
                let half = size / 2;
                match unit {
                    WindowUnit::Month => {
                        circular_window(u16::from(month_of(date)), half, MONTHS_IN_YEAR)
                            .into_iter()
                            .map(|m| GroupKey::Month(m as u8))
                            .collect()
                    }
                    WindowUnit::DayOfYear => {
                        circular_window(Doy::from_date(date).get(), half, DAYS_IN_YEAR)
                            .into_iter()
                            .map(GroupKey::DayOfYear)
                            .collect()
                    }
                }
            }
        }
    }

    /// The group whose factors apply to a value dated `date`.
    pub fn main_group(&self, date: NaiveDate) -> GroupKey {
        match *self {
            Self::None => GroupKey::All,
            Self::Monthly
            | Self::Window {
                unit: WindowUnit::Month,
                ..
            } => GroupKey::Month(month_of(date)),
            Self::Window {
                unit: WindowUnit::DayOfYear,
                ..
            } => GroupKey::DayOfYear(Doy::from_date(date).get()),
        }
    }

    /// `true` for `None` and `Monthly`, the groupings where each date has
    /// exactly one membership.
    pub fn is_disjoint(&self) -> bool {
        matches!(self, Self::None | Self::Monthly)
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Monthly => f.write_str("monthly"),
            Self::Window {
                unit: WindowUnit::Month,
                size,
            } => write!(f, "{size}monthly"),
            Self::Window {
                unit: WindowUnit::DayOfYear,
                size,
            } => write!(f, "doy:{size}"),
        }
    }
}

impl FromStr for Grouping {
    type Err = QuantileMapError;

    /// Accepts `none`, `monthly`, `<N>monthly` (e.g. `3monthly`) and `doy:<N>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let bad = |reason: String| QuantileMapError::config("grouping", reason);

        match s.as_str() {
            "none" | "" => return Ok(Self::None),
            "monthly" => return Ok(Self::Monthly),
            _ => {}
        }

        if let Some(n) = s.strip_prefix("doy:") {
            let size: u16 = n
                .parse()
                .map_err(|_| bad(format!("invalid day-of-year window '{n}'")))?;
            return Self::window(WindowUnit::DayOfYear, size);
        }
        if let Some(n) = s.strip_suffix("monthly") {
            let size: u16 = n
                .parse()
                .map_err(|_| bad(format!("invalid month window '{n}'")))?;
            return Self::window(WindowUnit::Month, size);
        }

        Err(bad(format!(
            "unknown grouping '{s}' (expected none, monthly, <N>monthly or doy:<N>)"
        )))
    }
}

impl TryFrom<String> for Grouping {
    type Error = QuantileMapError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Grouping> for String {
    fn from(g: Grouping) -> Self {
        g.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Month(m) => write!(f, "month:{m}"),
            Self::DayOfYear(d) => write!(f, "doy:{d}"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = QuantileMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || QuantileMapError::config("group", format!("invalid group label '{s}'"));
        if s == "all" {
            return Ok(Self::All);
        }
        if let Some(m) = s.strip_prefix("month:") {
            let m: u8 = m.parse().map_err(|_| bad())?;
            if !(1..=12).contains(&m) {
                return Err(bad());
            }
            return Ok(Self::Month(m));
        }
        if let Some(d) = s.strip_prefix("doy:") {
            let d: u16 = d.parse().map_err(|_| bad())?;
            return Ok(Self::DayOfYear(Doy::new(d)?.get()));
        }
        Err(bad())
    }
}

impl TryFrom<String> for GroupKey {
    type Error = QuantileMapError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GroupKey> for String {
    fn from(k: GroupKey) -> Self {
        k.to_string()
    }
}
