//! # qqscale-io
//!
//! Read daily climate variables from Parquet long tables into
//! [`Field`](qqscale_quantile_map::Field)s, write adjusted fields back, and
//! persist trained adjustment factors as JSON.
//!
//! ## Table layout
//!
//! | Column | Type | Notes |
//! |--------|------|-------|
//! | `time` | `Date32` | required |
//! | `lat`, `lon` | `Float64` | optional, both or neither |
//! | `<variable>` | `Float64` | nulls read as `NaN`; `units` in field metadata |

mod error;
mod factors_io;
mod parquet_read;
mod parquet_write;
mod reader;
mod units;
mod validate;
mod writer;

pub use error::IoError;
pub use factors_io::{FACTOR_FORMAT_VERSION, read_factors, write_factors, write_quantiles};
pub use reader::{ReaderConfig, read_field};
pub use units::{align_units, convert_units, same_units};
pub use writer::{Compression, WriterConfig, write_field};
