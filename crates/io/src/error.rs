//! Error types for qqscale-io.

use std::path::PathBuf;

use qqscale_quantile_map::QuantileMapError;

/// Error type for all fallible operations in the qqscale-io crate.
///
/// Covers file-system failures, Parquet/Arrow and JSON format errors, schema
/// validation problems, and errors raised by the quantile-mapping data model
/// while building series and factor sets from file contents.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// A file could not be opened, created or written.
    #[error("i/o error on {}: {reason}", path.display())]
    File {
        /// Path of the file.
        path: PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// Wraps an error originating from the Parquet or Arrow libraries.
    #[error("parquet error: {reason}")]
    Parquet {
        /// Description of the underlying Parquet failure.
        reason: String,
    },

    /// Wraps a JSON (de)serialization error.
    #[error("json error: {reason}")]
    Json {
        /// Description of the underlying serde_json failure.
        reason: String,
    },

    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned when a required column is not present in a file.
    #[error("column '{name}' not found in {}", path.display())]
    MissingColumn {
        /// Name of the missing column.
        name: String,
        /// Path to the file that was inspected.
        path: PathBuf,
    },

    /// A factor file written by an incompatible version.
    #[error("unsupported factor file version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version recorded in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Wraps an error from the quantile-mapping data model.
    #[error(transparent)]
    QuantileMap(#[from] QuantileMapError),
}

impl From<parquet::errors::ParquetError> for IoError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        IoError::Parquet {
            reason: e.to_string(),
        }
    }
}

impl From<arrow::error::ArrowError> for IoError {
    fn from(e: arrow::error::ArrowError) -> Self {
        IoError::Parquet {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json {
            reason: e.to_string(),
        }
    }
}

impl From<qqscale_calendar::CalendarError> for IoError {
    fn from(e: qqscale_calendar::CalendarError) -> Self {
        IoError::QuantileMap(e.into())
    }
}

impl IoError {
    pub(crate) fn file(path: &std::path::Path, e: std::io::Error) -> Self {
        IoError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}
