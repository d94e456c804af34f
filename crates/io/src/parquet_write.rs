//! Low-level Parquet column building.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, RecordBatch};
use arrow::datatypes::{DataType, Field as ArrowField, Schema};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use qqscale_quantile_map::Series;

use crate::error::IoError;
use crate::parquet_read::{LAT_COLUMN, LON_COLUMN, TIME_COLUMN, UNITS_KEY};

/// Builds the Arrow schema of a long table holding `variable`.
///
/// `time` comes first, then `lat`/`lon` when `has_coords`, then the variable.
/// `units`, if known, is stored on the variable's field metadata.
pub(crate) fn build_schema(variable: &str, has_coords: bool, units: Option<&str>) -> Schema {
    let mut fields = vec![ArrowField::new(TIME_COLUMN, DataType::Date32, false)];
    if has_coords {
        fields.push(ArrowField::new(LAT_COLUMN, DataType::Float64, false));
        fields.push(ArrowField::new(LON_COLUMN, DataType::Float64, false));
    }
    let mut value = ArrowField::new(variable, DataType::Float64, true);
    if let Some(units) = units {
        value = value.with_metadata(HashMap::from([(UNITS_KEY.to_string(), units.to_string())]));
    }
    fields.push(value);
    Schema::new(fields)
}

/// Days since the Unix epoch, the `Date32` encoding.
fn date32(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

/// Converts one series into a record batch. `coords` is required when the
/// schema has coordinate columns. `NaN` values are written as nulls.
pub(crate) fn series_to_record_batch(
    series: &Series,
    coords: Option<(f64, f64)>,
    schema: &Arc<Schema>,
) -> Result<RecordBatch, IoError> {
    let n = series.len();
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Date32Array::from(
        series.dates().iter().map(|&d| date32(d)).collect::<Vec<_>>(),
    ))];
    if let Some((lat, lon)) = coords {
        columns.push(Arc::new(Float64Array::from(vec![lat; n])));
        columns.push(Arc::new(Float64Array::from(vec![lon; n])));
    }
    columns.push(Arc::new(Float64Array::from(
        series
            .values()
            .iter()
            .map(|&v| (!v.is_nan()).then_some(v))
            .collect::<Vec<_>>(),
    )));

    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

/// Writes a sequence of [`RecordBatch`]es to a Parquet file at `path`.
///
/// # Errors
///
/// Returns [`IoError::File`] if the file cannot be created, or
/// [`IoError::Parquet`] if batch writing or file finalisation fails.
pub(crate) fn write_batches(
    path: &Path,
    batches: &[RecordBatch],
    schema: Arc<Schema>,
    props: WriterProperties,
) -> Result<(), IoError> {
    let file = std::fs::File::create(path).map_err(|e| IoError::file(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

    for batch in batches {
        writer.write(batch)?;
    }

    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use arrow::array::Array;

    use super::*;

    fn series() -> Series {
        let dates = vec![
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
        ];
        Series::new(dates, vec![1.0, f64::NAN]).unwrap()
    }

    #[test]
    fn point_schema() {
        let schema = build_schema("pr", false, Some("mm d-1"));
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field(0).name(), "time");
        assert_eq!(schema.field(1).name(), "pr");
        assert_eq!(schema.field(1).metadata().get("units").map(String::as_str), Some("mm d-1"));
    }

    #[test]
    fn gridded_schema() {
        let schema = build_schema("tas", true, None);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["time", "lat", "lon", "tas"]);
        assert!(schema.field(3).metadata().is_empty());
    }

    #[test]
    fn epoch_encoding() {
        assert_eq!(date32(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(date32(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 10957);
    }

    #[test]
    fn nan_written_as_null() {
        let schema = Arc::new(build_schema("pr", false, None));
        let batch = series_to_record_batch(&series(), None, &schema).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column(1).null_count(), 1);
    }

    #[test]
    fn coordinates_repeated_per_row() {
        let schema = Arc::new(build_schema("pr", true, None));
        let batch = series_to_record_batch(&series(), Some((45.0, 7.5)), &schema).unwrap();
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.num_rows(), 2);
    }
}
