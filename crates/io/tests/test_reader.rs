//! Integration tests: reading hand-built Parquet long tables.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use arrow::array::{ArrayRef, Date32Array, Float64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use qqscale_io::{IoError, ReaderConfig, read_field};
use qqscale_quantile_map::QuantileMapError;

/// 2000-01-01 as days since the epoch.
const Y2K: i32 = 10957;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Writes a long table. `coords` holds one `(lat, lon)` per row when given.
fn write_table(
    path: &Path,
    days: &[i32],
    coords: Option<&[(f64, f64)]>,
    values: &[f64],
    units: Option<&str>,
) {
    let mut fields = vec![Field::new("time", DataType::Date32, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Date32Array::from(days.to_vec()))];
    if let Some(coords) = coords {
        fields.push(Field::new("lat", DataType::Float64, false));
        fields.push(Field::new("lon", DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(coords.iter().map(|c| c.0).collect::<Vec<_>>())));
        columns.push(Arc::new(Float64Array::from(coords.iter().map(|c| c.1).collect::<Vec<_>>())));
    }
    let mut value = Field::new("var", DataType::Float64, true);
    if let Some(u) = units {
        value = value.with_metadata(HashMap::from([("units".to_string(), u.to_string())]));
    }
    fields.push(value);
    columns.push(Arc::new(Float64Array::from(values.to_vec())));

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

#[test]
fn read_field_file_not_found() {
    let path = Path::new("/tmp/qqscale_test_nonexistent_file.parquet");
    let err = read_field(path, &ReaderConfig::new("pr")).unwrap_err();
    assert!(
        matches!(err, IoError::FileNotFound { .. }),
        "expected FileNotFound, got {err:?}",
    );
}

#[test]
fn invalid_config_rejects_early() {
    let path = Path::new("/tmp/qqscale_test_nonexistent_file.parquet");
    let err = read_field(path, &ReaderConfig::new("")).unwrap_err();
    assert!(
        matches!(err, IoError::Validation { .. }),
        "expected Validation error, got {err:?}",
    );
}

#[test]
fn point_series_sorted_with_units() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("point.parquet");
    write_table(&path, &[Y2K + 2, Y2K, Y2K + 1], None, &[3.0, 1.0, 2.0], Some("mm d-1"));

    let field = read_field(&path, &ReaderConfig::new("var")).unwrap();
    assert!(field.grid().is_none());
    let s = &field.cells()[0];
    assert_eq!(s.dates(), &[date(2000, 1, 1), date(2000, 1, 2), date(2000, 1, 3)]);
    assert_eq!(s.values(), &[1.0, 2.0, 3.0]);
    assert_eq!(s.units(), Some("mm d-1"));
}

#[test]
fn bounds_and_leap_days_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leap.parquet");
    // 2000-02-27 ..= 2000-03-02
    let days: Vec<i32> = (57..62).map(|d| Y2K + d).collect();
    write_table(&path, &days, None, &[1.0, 2.0, 3.0, 4.0, 5.0], None);

    let config = ReaderConfig::new("var")
        .with_time_bounds(Some(date(2000, 2, 28)), Some(date(2000, 3, 1)))
        .with_drop_leap_days(true);
    let field = read_field(&path, &config).unwrap();
    let s = &field.cells()[0];
    assert_eq!(s.dates(), &[date(2000, 2, 28), date(2000, 3, 1)]);
    assert_eq!(s.values(), &[2.0, 4.0]);
}

#[test]
fn units_converted_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tas.parquet");
    write_table(&path, &[Y2K, Y2K + 1], None, &[273.15, 283.15], Some("K"));

    let config = ReaderConfig::new("var").with_output_units(Some("degC".into()));
    let s = read_field(&path, &config).unwrap().into_cells().remove(0);
    assert_eq!(s.units(), Some("degC"));
    assert_relative_eq!(s.values()[0], 0.0, epsilon = 1e-12);
    assert_relative_eq!(s.values()[1], 10.0, epsilon = 1e-12);

    let bad = ReaderConfig::new("var").with_output_units(Some("mm d-1".into()));
    let err = read_field(&path, &bad).unwrap_err();
    assert!(matches!(err, IoError::QuantileMap(QuantileMapError::UnitMismatch { .. })));
}

#[test]
fn input_units_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pr.parquet");
    write_table(&path, &[Y2K], None, &[2e-5], None);

    let missing = ReaderConfig::new("var").with_output_units(Some("mm d-1".into()));
    assert!(matches!(read_field(&path, &missing).unwrap_err(), IoError::Validation { .. }));

    let config = missing.with_input_units(Some("kg m-2 s-1".into()));
    let s = read_field(&path, &config).unwrap().into_cells().remove(0);
    assert_relative_eq!(s.values()[0], 1.728, epsilon = 1e-12);
}

#[test]
fn gridded_table_assembled_row_major() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.parquet");
    let cells = [(10.0, 5.0), (10.0, 6.0), (-10.0, 5.0), (-10.0, 6.0)];
    let mut days = Vec::new();
    let mut coords = Vec::new();
    let mut values = Vec::new();
    for (k, c) in cells.iter().enumerate() {
        for d in 0..3 {
            days.push(Y2K + d);
            coords.push(*c);
            values.push(k as f64 * 10.0 + d as f64);
        }
    }
    write_table(&path, &days, Some(&coords), &values, Some("K"));

    let field = read_field(&path, &ReaderConfig::new("var")).unwrap();
    let grid = field.grid().unwrap();
    assert_eq!(grid.lats(), &[-10.0, 10.0]);
    assert_eq!(grid.lons(), &[5.0, 6.0]);
    // row-major over sorted axes: (-10, 5) was written third
    assert_eq!(field.cells()[0].values(), &[20.0, 21.0, 22.0]);
    assert_eq!(field.cells()[3].values(), &[10.0, 11.0, 12.0]);
    assert_eq!(field.cells()[1].location().map(|l| (l.lat, l.lon)), Some((-10.0, 6.0)));
}

#[test]
fn incomplete_grid_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holes.parquet");
    let coords = [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0)];
    write_table(&path, &[Y2K, Y2K, Y2K], Some(&coords), &[1.0, 2.0, 3.0], None);

    match read_field(&path, &ReaderConfig::new("var")).unwrap_err() {
        IoError::Validation { details, .. } => assert!(details.contains("no rows for cell (1, 1)")),
        other => panic!("expected Validation error, got {other:?}"),
    }
}
