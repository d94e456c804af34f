//! High-level Parquet writer configuration and orchestration.

use std::path::Path;
use std::sync::Arc;

use parquet::file::properties::WriterProperties;
use qqscale_quantile_map::Field;
use tracing::info;

use crate::error::IoError;
use crate::parquet_write;

/// Compression algorithm for Parquet output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Snappy compression (fast, moderate ratio).
    #[default]
    Snappy,
    /// Zstd compression (slower, better ratio).
    Zstd,
}

impl Compression {
    /// Converts to the corresponding `parquet::basic::Compression` variant.
    fn to_parquet(self) -> Result<parquet::basic::Compression, IoError> {
        Ok(match self {
            Self::None => parquet::basic::Compression::UNCOMPRESSED,
            Self::Snappy => parquet::basic::Compression::SNAPPY,
            Self::Zstd => {
                let level = parquet::basic::ZstdLevel::try_new(3)?;
                parquet::basic::Compression::ZSTD(level)
            }
        })
    }
}

impl std::str::FromStr for Compression {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            other => Err(IoError::Validation {
                count: 1,
                details: format!("unknown compression '{other}' (expected none, snappy or zstd)"),
            }),
        }
    }
}

/// Configuration for writing a field to Parquet.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Name of the value column.
    variable: String,
    /// Compression algorithm to use.
    compression: Compression,
    /// Maximum number of rows per row group.
    row_group_size: usize,
}

impl WriterConfig {
    /// Writes the values to a column named `variable` with Snappy compression.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            compression: Compression::default(),
            row_group_size: 1_000_000,
        }
    }

    /// Sets the compression algorithm.
    pub fn with_compression(mut self, comp: Compression) -> Self {
        self.compression = comp;
        self
    }

    /// Sets the maximum number of rows per row group.
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// # Errors
    ///
    /// Returns [`IoError::Validation`] if `row_group_size` is zero or the
    /// variable name is empty or collides with a coordinate column.
    fn validate(&self) -> Result<(), IoError> {
        if self.row_group_size == 0 {
            return Err(IoError::Validation {
                count: 1,
                details: "row_group_size must be greater than 0".to_string(),
            });
        }
        if matches!(self.variable.as_str(), "" | "time" | "lat" | "lon") {
            return Err(IoError::Validation {
                count: 1,
                details: format!("invalid variable column name '{}'", self.variable),
            });
        }
        Ok(())
    }
}

/// Write a field to a Parquet long table.
///
/// Each cell becomes one record batch. Gridded fields carry `lat`/`lon`
/// columns; the units of the first cell are stored as column metadata.
///
/// # Errors
///
/// Returns [`IoError::Validation`] if the configuration is invalid, or
/// [`IoError::Parquet`] if batch conversion or file I/O fails.
pub fn write_field(path: &Path, field: &Field, config: &WriterConfig) -> Result<(), IoError> {
    config.validate()?;

    let has_coords = field.grid().is_some();
    let schema = Arc::new(parquet_write::build_schema(
        &config.variable,
        has_coords,
        field.units(),
    ));

    let props = WriterProperties::builder()
        .set_compression(config.compression.to_parquet()?)
        .set_max_row_group_size(config.row_group_size)
        .build();

    let coords = field.coords();
    let batches = field
        .cells()
        .iter()
        .zip(coords)
        .map(|(cell, c)| parquet_write::series_to_record_batch(cell, has_coords.then_some(c), &schema))
        .collect::<Result<Vec<_>, _>>()?;

    parquet_write::write_batches(path, &batches, schema, props)?;
    info!(path = %path.display(), cells = field.len(), "wrote field");
    Ok(())
}
