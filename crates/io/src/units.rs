//! Unit labels and the conversions between compatible ones.
//!
//! Only the conversions daily climate variables need are known: temperature
//! between kelvin and degrees Celsius, and precipitation between a mass flux
//! and a daily depth.

use qqscale_quantile_map::{Field, QuantileMapError};
use tracing::debug;

const KELVIN_OFFSET: f64 = 273.15;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Kelvin,
    Celsius,
    /// kg m-2 s-1, numerically equal to mm s-1 of water.
    MassFlux,
    MmPerDay,
}

impl Unit {
    fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "K" | "kelvin" => Some(Self::Kelvin),
            "degC" | "C" | "°C" | "deg_C" | "celsius" => Some(Self::Celsius),
            "kg m-2 s-1" | "kg/m2/s" | "kg m**-2 s**-1" => Some(Self::MassFlux),
            "mm d-1" | "mm/d" | "mm/day" | "mm day-1" => Some(Self::MmPerDay),
            _ => None,
        }
    }

    /// `(scale, offset)` with `to = from * scale + offset`.
    fn transform(self, to: Unit) -> Option<(f64, f64)> {
        use Unit::*;
        match (self, to) {
            (a, b) if a == b => Some((1.0, 0.0)),
            (Kelvin, Celsius) => Some((1.0, -KELVIN_OFFSET)),
            (Celsius, Kelvin) => Some((1.0, KELVIN_OFFSET)),
            (MassFlux, MmPerDay) => Some((SECONDS_PER_DAY, 0.0)),
            (MmPerDay, MassFlux) => Some((1.0 / SECONDS_PER_DAY, 0.0)),
            _ => None,
        }
    }
}

/// Whether two labels name the same unit.
pub fn same_units(a: &str, b: &str) -> bool {
    a == b || matches!((Unit::parse(a), Unit::parse(b)), (Some(x), Some(y)) if x == y)
}

/// Relabels `field` with `to` when its units are an alias of `to`, so that
/// exact label comparisons downstream succeed. Other fields pass unchanged.
pub fn align_units(field: Field, to: Option<&str>) -> Field {
    let relabel = match (field.units(), to) {
        (Some(have), Some(want)) => have != want && same_units(have, want),
        _ => false,
    };
    match to {
        Some(want) if relabel => {
            debug!(from = field.units().unwrap_or_default(), to = want, "relabelling unit alias");
            field.with_units(want)
        }
        _ => field,
    }
}

/// Converts `values` from units `from` to units `to`.
///
/// Identical labels convert trivially, even when unknown.
///
/// # Errors
///
/// [`QuantileMapError::UnitMismatch`] if no conversion between the two is
/// known.
pub fn convert_units(values: &[f64], from: &str, to: &str) -> Result<Vec<f64>, QuantileMapError> {
    if from == to {
        return Ok(values.to_vec());
    }
    let (scale, offset) = Unit::parse(from)
        .zip(Unit::parse(to))
        .and_then(|(f, t)| f.transform(t))
        .ok_or_else(|| QuantileMapError::UnitMismatch {
            context: "unit conversion".to_string(),
            expected: to.to_string(),
            got: from.to_string(),
        })?;
    Ok(values.iter().map(|v| v * scale + offset).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kelvin_to_celsius() {
        let out = convert_units(&[273.15, 300.0], "K", "degC").unwrap();
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 26.85, epsilon = 1e-9);
    }

    #[test]
    fn flux_to_daily_depth_and_back() {
        let out = convert_units(&[1e-5], "kg m-2 s-1", "mm d-1").unwrap();
        assert_relative_eq!(out[0], 0.864, epsilon = 1e-12);
        let back = convert_units(&out, "mm/day", "kg m-2 s-1").unwrap();
        assert_relative_eq!(back[0], 1e-5, epsilon = 1e-15);
    }

    #[test]
    fn nan_stays_nan() {
        let out = convert_units(&[f64::NAN], "C", "K").unwrap();
        assert!(out[0].is_nan());
    }

    #[test]
    fn identical_unknown_labels_pass() {
        assert_eq!(convert_units(&[2.0], "m s-1", "m s-1").unwrap(), vec![2.0]);
    }

    #[test]
    fn incompatible_units_rejected() {
        let err = convert_units(&[1.0], "K", "mm d-1").unwrap_err();
        assert!(matches!(err, QuantileMapError::UnitMismatch { .. }));
    }

    #[test]
    fn align_units_relabels_aliases_only() {
        use chrono::NaiveDate;
        use qqscale_quantile_map::Series;

        let date = NaiveDate::from_ymd_opt(2050, 1, 1).unwrap();
        let field = |u: &str| Field::point(Series::new(vec![date], vec![1.5]).unwrap().with_units(u));

        let aligned = align_units(field("mm/day"), Some("mm d-1"));
        assert_eq!(aligned.units(), Some("mm d-1"));
        assert_eq!(aligned.cells()[0].values(), &[1.5]);

        assert_eq!(align_units(field("K"), Some("degC")).units(), Some("K"));
        assert_eq!(align_units(field("mm/day"), None).units(), Some("mm/day"));
    }

    #[test]
    fn aliases_are_same_units() {
        assert!(same_units("mm/day", "mm d-1"));
        assert!(same_units("unknown", "unknown"));
        assert!(!same_units("K", "degC"));
    }
}
