//! Low-level Parquet reading and column extraction.

use std::path::Path;

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{DataType, Date32Type, Float64Type, Schema};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::IoError;
use crate::validate::ValidationCollector;

/// Name of the date column.
pub(crate) const TIME_COLUMN: &str = "time";
/// Names of the optional coordinate columns.
pub(crate) const LAT_COLUMN: &str = "lat";
pub(crate) const LON_COLUMN: &str = "lon";
/// Metadata key holding the units label.
pub(crate) const UNITS_KEY: &str = "units";

/// Information about the validated schema.
#[derive(Debug)]
pub(crate) struct Layout {
    /// Whether `lat`/`lon` columns are present.
    pub has_coords: bool,
    /// Units label from the variable's field metadata, or the schema's.
    pub units: Option<String>,
}

/// One row of the long table. `lat`/`lon` are `NaN` without coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Row {
    pub date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

/// Reads all record batches from a Parquet file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the file does not exist, or
/// [`IoError::Parquet`] if the file cannot be opened or read.
pub(crate) fn read_batches(path: &Path) -> Result<(Vec<RecordBatch>, Schema), IoError> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = std::fs::File::open(path).map_err(|e| IoError::file(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().as_ref().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((batches, schema))
}

/// Validates the schema of a long table holding `variable`.
///
/// # Errors
///
/// Returns [`IoError::MissingColumn`] if `time` or `variable` is absent, and
/// [`IoError::Validation`] for wrong column types or a lone coordinate column.
pub(crate) fn inspect_schema(schema: &Schema, variable: &str, path: &Path) -> Result<Layout, IoError> {
    let missing = |name: &str| IoError::MissingColumn {
        name: name.to_string(),
        path: path.to_path_buf(),
    };
    let time = schema.field_with_name(TIME_COLUMN).map_err(|_| missing(TIME_COLUMN))?;
    let var = schema.field_with_name(variable).map_err(|_| missing(variable))?;
    let lat = schema.field_with_name(LAT_COLUMN).ok();
    let lon = schema.field_with_name(LON_COLUMN).ok();

    let mut c = ValidationCollector::new();
    if time.data_type() != &DataType::Date32 {
        c.push(format!("column '{TIME_COLUMN}' must be Date32, got {}", time.data_type()));
    }
    for field in [Some(var), lat, lon].into_iter().flatten() {
        if field.data_type() != &DataType::Float64 {
            c.push(format!("column '{}' must be Float64, got {}", field.name(), field.data_type()));
        }
    }
    if lat.is_some() != lon.is_some() {
        c.push(format!("columns '{LAT_COLUMN}' and '{LON_COLUMN}' must appear together"));
    }
    c.finish()?;

    let units = var
        .metadata()
        .get(UNITS_KEY)
        .or_else(|| schema.metadata().get(UNITS_KEY))
        .cloned();

    Ok(Layout {
        has_coords: lat.is_some(),
        units,
    })
}

/// Flattens record batches into rows. Null values become `NaN`.
///
/// # Errors
///
/// Returns [`IoError::Validation`] if a date is null.
pub(crate) fn extract_rows(
    batches: &[RecordBatch],
    variable: &str,
    has_coords: bool,
) -> Result<Vec<Row>, IoError> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());

    for batch in batches {
        let column = |name: &str| {
            batch.column_by_name(name).ok_or_else(|| IoError::Validation {
                count: 1,
                details: format!("record batch lacks column '{name}'"),
            })
        };
        let time_col = column(TIME_COLUMN)?.as_primitive::<Date32Type>().clone();
        let value_col = column(variable)?.as_primitive::<Float64Type>().clone();
        let coord_cols = if has_coords {
            Some((
                column(LAT_COLUMN)?.as_primitive::<Float64Type>().clone(),
                column(LON_COLUMN)?.as_primitive::<Float64Type>().clone(),
            ))
        } else {
            None
        };

        for row in 0..batch.num_rows() {
            let date = time_col
                .value_as_date(row)
                .filter(|_| time_col.is_valid(row))
                .ok_or_else(|| IoError::Validation {
                    count: 1,
                    details: format!("null or out-of-range date in row {row}"),
                })?;
            let value = if value_col.is_valid(row) {
                value_col.value(row)
            } else {
                f64::NAN
            };
            let (lat, lon) = match &coord_cols {
                Some((lat, lon)) => (lat.value(row), lon.value(row)),
                None => (f64::NAN, f64::NAN),
            };
            rows.push(Row {
                date,
                lat,
                lon,
                value,
            });
        }
    }

    Ok(rows)
}
