use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use qqscale_quantile_map::DEFAULT_SSR_THRESHOLD;

/// Top-level qqscale configuration file.
///
/// Every section and key is optional; CLI flags override file values.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QqscaleConfig {
    /// Base RNG seed; cell `i` uses `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,

    /// `abort` or `mark-missing`.
    #[serde(default = "default_failure_policy")]
    pub failure_policy: String,

    /// Regridding method for fields on different grids (`nearest`).
    #[serde(default)]
    pub regrid: Option<String>,

    /// I/O settings.
    #[serde(default)]
    pub io: IoToml,

    /// Training settings.
    #[serde(default)]
    pub train: TrainToml,

    /// Adjustment settings.
    #[serde(default)]
    pub adjust: AdjustToml,

    /// Mean-change matching settings.
    #[serde(default)]
    pub mean_change: MeanChangeToml,
}

impl QqscaleConfig {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config: {}", path.display()))
    }
}

impl Default for QqscaleConfig {
    fn default() -> Self {
        Self {
            seed: None,
            failure_policy: default_failure_policy(),
            regrid: None,
            io: IoToml::default(),
            train: TrainToml::default(),
            adjust: AdjustToml::default(),
            mean_change: MeanChangeToml::default(),
        }
    }
}

fn default_failure_policy() -> String {
    "abort".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoToml {
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Overrides the units recorded in input files.
    #[serde(default)]
    pub input_units: Option<String>,
    /// Converts inputs to these units after reading.
    #[serde(default)]
    pub output_units: Option<String>,
    #[serde(default)]
    pub drop_leap_days: bool,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

impl Default for IoToml {
    fn default() -> Self {
        Self {
            variable: default_variable(),
            input_units: None,
            output_units: None,
            drop_leap_days: false,
            compression: default_compression(),
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_variable() -> String {
    "pr".to_string()
}
fn default_compression() -> String {
    "snappy".to_string()
}
fn default_row_group_size() -> usize {
    1_000_000
}

/// Inclusive `["YYYY-MM-DD", "YYYY-MM-DD"]` date range.
pub type PeriodToml = [String; 2];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainToml {
    #[serde(default = "default_scaling")]
    pub scaling: String,
    #[serde(default = "default_grouping")]
    pub grouping: String,
    #[serde(default = "default_n_quantiles")]
    pub n_quantiles: usize,
    #[serde(default)]
    pub ssr: bool,
    #[serde(default = "default_ssr_threshold")]
    pub ssr_threshold: f64,
    #[serde(default = "default_degenerate_policy")]
    pub degenerate_policy: String,
    #[serde(default)]
    pub max_factor: Option<f64>,
    /// Dry-day threshold for frequency adaptation; unset disables it.
    #[serde(default)]
    pub adapt_freq: Option<f64>,
    #[serde(default = "default_grid_side")]
    pub grid_side: String,
    #[serde(default)]
    pub historical_period: Option<PeriodToml>,
    #[serde(default)]
    pub reference_period: Option<PeriodToml>,
}

impl Default for TrainToml {
    fn default() -> Self {
        Self {
            scaling: default_scaling(),
            grouping: default_grouping(),
            n_quantiles: default_n_quantiles(),
            ssr: false,
            ssr_threshold: default_ssr_threshold(),
            degenerate_policy: default_degenerate_policy(),
            max_factor: None,
            adapt_freq: None,
            grid_side: default_grid_side(),
            historical_period: None,
            reference_period: None,
        }
    }
}

fn default_scaling() -> String {
    "additive".to_string()
}
fn default_grouping() -> String {
    "monthly".to_string()
}
fn default_n_quantiles() -> usize {
    100
}
fn default_ssr_threshold() -> f64 {
    DEFAULT_SSR_THRESHOLD
}
fn default_degenerate_policy() -> String {
    "error".to_string()
}
fn default_grid_side() -> String {
    "historical".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustToml {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_interpolation")]
    pub interpolation: String,
    #[serde(default = "default_extrapolation")]
    pub extrapolation: String,
    #[serde(default)]
    pub max_factor: Option<f64>,
    #[serde(default)]
    pub valid_min: Option<f64>,
    #[serde(default)]
    pub valid_max: Option<f64>,
    #[serde(default)]
    pub ssr: bool,
    #[serde(default = "default_ssr_threshold")]
    pub ssr_threshold: f64,
    /// Shift output dates by `reference start - historical start`.
    #[serde(default)]
    pub ref_time: bool,
    #[serde(default)]
    pub target_period: Option<PeriodToml>,
    #[serde(default)]
    pub output_slice: Option<PeriodToml>,
    #[serde(default = "default_output_grid")]
    pub output_grid: String,
}

impl Default for AdjustToml {
    fn default() -> Self {
        Self {
            method: default_method(),
            interpolation: default_interpolation(),
            extrapolation: default_extrapolation(),
            max_factor: None,
            valid_min: None,
            valid_max: None,
            ssr: false,
            ssr_threshold: default_ssr_threshold(),
            ref_time: false,
            target_period: None,
            output_slice: None,
            output_grid: default_output_grid(),
        }
    }
}

fn default_method() -> String {
    "eqm".to_string()
}
fn default_interpolation() -> String {
    "nearest".to_string()
}
fn default_extrapolation() -> String {
    "constant".to_string()
}
fn default_output_grid() -> String {
    "input".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeanChangeToml {
    /// Falls back to `[train].scaling` when unset.
    #[serde(default)]
    pub scaling: Option<String>,
    #[serde(default = "default_mean_change_grouping")]
    pub grouping: String,
}

impl Default for MeanChangeToml {
    fn default() -> Self {
        Self {
            scaling: None,
            grouping: default_mean_change_grouping(),
        }
    }
}

fn default_mean_change_grouping() -> String {
    "none".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: QqscaleConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.failure_policy, "abort");
        assert_eq!(cfg.io.variable, "pr");
        assert_eq!(cfg.train.grouping, "monthly");
        assert_eq!(cfg.train.n_quantiles, 100);
        assert_eq!(cfg.adjust.method, "eqm");
        assert_eq!(cfg.mean_change.grouping, "none");
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn load_without_path_matches_empty_file() {
        let cfg = QqscaleConfig::load(None).unwrap();
        assert_eq!(cfg.failure_policy, "abort");
        assert_eq!(cfg.train.scaling, "additive");
    }

    #[test]
    fn sections_parse() {
        let cfg: QqscaleConfig = toml::from_str(
            r#"
            seed = 7
            regrid = "nearest"

            [io]
            variable = "tas"
            output_units = "degC"

            [train]
            scaling = "multiplicative"
            ssr = true
            historical_period = ["1981-01-01", "2010-12-31"]

            [adjust]
            method = "qdm"
            valid_min = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.regrid.as_deref(), Some("nearest"));
        assert_eq!(cfg.io.output_units.as_deref(), Some("degC"));
        assert!(cfg.train.ssr);
        assert_eq!(
            cfg.train.historical_period,
            Some(["1981-01-01".to_string(), "2010-12-31".to_string()])
        );
        assert_eq!(cfg.adjust.valid_min, Some(0.0));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<QqscaleConfig>("[train]\nquantiles = 10\n").is_err());
        assert!(toml::from_str::<QqscaleConfig>("[output]\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qqscale.toml");
        std::fs::write(&path, "[adjust]\ninterpolation = \"linear\"\n").unwrap();
        let cfg = QqscaleConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.adjust.interpolation, "linear");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = QqscaleConfig::load(Some(Path::new("/nonexistent/qqscale.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/qqscale.toml"));
    }
}
