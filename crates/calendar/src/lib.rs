//! # qqscale-calendar
//!
//! Date arithmetic for grouping daily climate data on the 365-day no-leap
//! cycle.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["NaiveDate"] -->|"Doy::from_date()"| B["Doy (1..=365)"]
//!     B -->|".month()"| C["month (1..=12)"]
//!     B -->|"circular_window()"| D["neighbouring doys"]
//!     A -->|"noleap_sequence()"| E["Vec of NaiveDate"]
//! ```
//!
//! February 29 has no slot of its own: it folds onto February 28 (doy 59),
//! so every calendar date maps to exactly one day of the no-leap cycle.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use qqscale_calendar::{Doy, circular_window, noleap_sequence, parse_date};
//!
//! let date = parse_date("2000-03-15").unwrap();
//! assert_eq!(Doy::from_date(date).get(), 74);
//!
//! // 31-day window around Jan 1 wraps into December.
//! let window = circular_window(1, 15, 365);
//! assert!(window.contains(&351));
//!
//! let dates = noleap_sequence(date, 730);
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `doy` | Day-of-year newtype |
//! | `date` | Date parsing, formatting and leap-day helpers |
//! | `sequence` | No-leap date sequence generation |
//! | `window` | Circular distances and windows on periodic cycles |
//! | `error` | Error types |

mod date;
mod doy;
mod error;
mod sequence;
mod window;

pub use date::{format_date, is_leap_day, month_of, parse_date};
pub use doy::{DAYS_IN_YEAR, Doy};
pub use error::CalendarError;
pub use sequence::noleap_sequence;
pub use window::{circular_distance, circular_window};
