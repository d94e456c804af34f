//! JSON persistence of trained adjustment factors and quantile diagnostics.
//!
//! A factor file is a versioned container around a [`FactorField`]: the grid
//! (or `null` for a point) and one entry per cell holding the scaling mode,
//! grouping, nodes, units, training periods as `YYYY-MM-DD`, and per group
//! the `hist_q` and `factor` curves.

use std::io::{BufReader, BufWriter};
use std::path::Path;

use qqscale_quantile_map::{FactorField, QuantileTable};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IoError;

/// Version written by this build.
pub const FACTOR_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct FactorFileRef<'a> {
    format_version: u32,
    factors: &'a FactorField,
}

#[derive(Deserialize)]
struct FactorFile {
    format_version: u32,
    factors: FactorField,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let file = std::fs::File::create(path).map_err(|e| IoError::file(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Writes `factors` to `path` as JSON.
///
/// # Errors
///
/// [`IoError::File`] if the file cannot be created, [`IoError::Json`] if
/// serialization fails.
pub fn write_factors(path: &Path, factors: &FactorField) -> Result<(), IoError> {
    write_json(
        path,
        &FactorFileRef {
            format_version: FACTOR_FORMAT_VERSION,
            factors,
        },
    )?;
    info!(path = %path.display(), cells = factors.len(), "wrote adjustment factors");
    Ok(())
}

/// Reads a factor file written by [`write_factors`] and validates every cell.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`IoError::FileNotFound`] | `path` does not exist |
/// | [`IoError::Json`] | malformed content |
/// | [`IoError::UnsupportedVersion`] | `format_version` differs from [`FACTOR_FORMAT_VERSION`] |
/// | [`IoError::QuantileMap`] | a cell violates the factor-set invariants |
pub fn read_factors(path: &Path) -> Result<FactorField, IoError> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = std::fs::File::open(path).map_err(|e| IoError::file(path, e))?;
    let parsed: FactorFile = serde_json::from_reader(BufReader::new(file))?;
    if parsed.format_version != FACTOR_FORMAT_VERSION {
        return Err(IoError::UnsupportedVersion {
            found: parsed.format_version,
            expected: FACTOR_FORMAT_VERSION,
        });
    }
    parsed.factors.validate()?;
    info!(path = %path.display(), cells = parsed.factors.len(), "read adjustment factors");
    Ok(parsed.factors)
}

/// Writes per-cell quantile tables to `path` as JSON.
pub fn write_quantiles(path: &Path, tables: &[Option<QuantileTable>]) -> Result<(), IoError> {
    write_json(path, &tables)?;
    info!(path = %path.display(), cells = tables.len(), "wrote quantiles");
    Ok(())
}
