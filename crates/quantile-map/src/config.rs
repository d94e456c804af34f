//! Configuration for training and applying adjustment factors.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::QuantileMapError;
use crate::grouping::Grouping;
use crate::ssr::DEFAULT_SSR_THRESHOLD;

/// Quantiles closer to zero than this are treated as zero under
/// multiplicative scaling.
pub(crate) const ZERO_TOLERANCE: f64 = 1e-12;

/// How a factor combines with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// `factor = ref - hist`, applied as `value + factor`.
    Additive,
    /// `factor = ref / hist`, applied as `value * factor`.
    Multiplicative,
}

impl ScalingMode {
    /// Factor that maps `hist` onto `reference`.
    pub fn factor(self, reference: f64, hist: f64) -> f64 {
        match self {
            Self::Additive => reference - hist,
            Self::Multiplicative => reference / hist,
        }
    }

    /// Applies `factor` to `value`.
    pub fn apply(self, value: f64, factor: f64) -> f64 {
        match self {
            Self::Additive => value + factor,
            Self::Multiplicative => value * factor,
        }
    }

    /// Limits `factor` to `max` (multiplicative) or to `[-max, max]` (additive).
    /// A `NaN` factor stays `NaN`.
    pub fn cap(self, factor: f64, max: f64) -> f64 {
        if factor.is_nan() {
            return factor;
        }
        match self {
            Self::Additive => factor.clamp(-max, max),
            Self::Multiplicative => factor.min(max),
        }
    }

    /// The factor that leaves values unchanged.
    pub fn identity(self) -> f64 {
        match self {
            Self::Additive => 0.0,
            Self::Multiplicative => 1.0,
        }
    }
}

/// Interpolation between factor knots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Factor of the closest knot.
    #[default]
    Nearest,
    /// Piecewise linear.
    Linear,
    /// Natural cubic spline.
    Cubic,
}

/// Treatment of values outside the knot range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extrapolation {
    /// Reuse the boundary factor.
    #[default]
    Constant,
    /// Out-of-range values become missing.
    Nan,
}

/// Which quantile curve a value is looked up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMethod {
    /// Empirical quantile mapping: the value itself is placed on the
    /// historical quantile curve.
    #[default]
    Eqm,
    /// Quantile delta mapping: the value's percent rank within its own group
    /// is placed on the probability nodes.
    Qdm,
}

/// What to do when a historical quantile is zero under multiplicative scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Fail with [`QuantileMapError::DegenerateQuantile`].
    #[default]
    Error,
    /// Replace the factor with the configured maximum (1 when the reference
    /// quantile is zero as well).
    Cap,
}

/// Grid kept when training inputs are on different grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridSide {
    /// Reference data is regridded onto the historical grid.
    #[default]
    Historical,
    /// Historical data is regridded onto the reference grid.
    Reference,
}

/// Grid of the output when target and factors are on different grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputGrid {
    /// Factors are regridded onto the target grid.
    #[default]
    Input,
    /// The target is regridded onto the factor grid.
    Factors,
}

/// Handling of a grid cell whose computation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing cell.
    #[default]
    Abort,
    /// Leave the cell missing, log a warning and report it in the result.
    MarkMissing,
}

macro_rules! lowercase_enum_str {
    ($ty:ident, $param:literal, { $($name:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = QuantileMapError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(QuantileMapError::config(
                        $param,
                        format!(
                            "unknown value '{}' (expected one of: {})",
                            other,
                            [$($name),+].join(", ")
                        ),
                    )),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name,)+
                })
            }
        }
    };
}

lowercase_enum_str!(ScalingMode, "scaling", {
    "additive" => Additive,
    "multiplicative" => Multiplicative,
});
lowercase_enum_str!(Interpolation, "interpolation", {
    "nearest" => Nearest,
    "linear" => Linear,
    "cubic" => Cubic,
});
lowercase_enum_str!(Extrapolation, "extrapolation", {
    "constant" => Constant,
    "nan" => Nan,
});
lowercase_enum_str!(AdjustMethod, "method", { "eqm" => Eqm, "qdm" => Qdm });
lowercase_enum_str!(DegeneratePolicy, "degenerate_policy", { "error" => Error, "cap" => Cap });
lowercase_enum_str!(GridSide, "grid_side", {
    "historical" => Historical,
    "reference" => Reference,
});
lowercase_enum_str!(OutputGrid, "output_grid", { "input" => Input, "factors" => Factors });
lowercase_enum_str!(FailurePolicy, "failure_policy", {
    "abort" => Abort,
    "mark-missing" => MarkMissing,
});

fn check_positive(parameter: &str, v: f64) -> Result<(), QuantileMapError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(QuantileMapError::config(
            parameter,
            format!("must be finite and > 0, got {v}"),
        ));
    }
    Ok(())
}

/// Configuration for [`train`](crate::train) and
/// [`train_field`](crate::train_field).
///
/// # Example
///
/// ```
/// use qqscale_quantile_map::{Grouping, ScalingMode, TrainConfig};
///
/// let config = TrainConfig::new(ScalingMode::Multiplicative)
///     .with_grouping(Grouping::Monthly)
///     .with_n_quantiles(50)
///     .with_ssr(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct TrainConfig {
    scaling: ScalingMode,
    grouping: Grouping,
    n_quantiles: usize,
    ssr: bool,
    ssr_threshold: f64,
    degenerate_policy: DegeneratePolicy,
    max_factor: Option<f64>,
    adapt_freq_threshold: Option<f64>,
    grid_side: GridSide,
    failure_policy: FailurePolicy,
    seed: u64,
}

impl TrainConfig {
    /// Creates a configuration for `scaling`.
    ///
    /// Defaults: `grouping = None`, `n_quantiles = 100`, `ssr = false`,
    /// `ssr_threshold = 8.64e-4`, `degenerate_policy = Error`,
    /// `max_factor = None`, no frequency adaptation,
    /// `grid_side = Historical`, `failure_policy = Abort`, `seed = 0`.
    pub fn new(scaling: ScalingMode) -> Self {
        Self {
            scaling,
            grouping: Grouping::None,
            n_quantiles: 100,
            ssr: false,
            ssr_threshold: DEFAULT_SSR_THRESHOLD,
            degenerate_policy: DegeneratePolicy::Error,
            max_factor: None,
            adapt_freq_threshold: None,
            grid_side: GridSide::Historical,
            failure_policy: FailurePolicy::Abort,
            seed: 0,
        }
    }

    // --- Builder methods ---

    pub fn with_scaling(mut self, scaling: ScalingMode) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Sets the number of equally spaced probability nodes.
    pub fn with_n_quantiles(mut self, n: usize) -> Self {
        self.n_quantiles = n;
        self
    }

    /// Enables singularity stochastic removal on both inputs.
    pub fn with_ssr(mut self, ssr: bool) -> Self {
        self.ssr = ssr;
        self
    }

    pub fn with_ssr_threshold(mut self, threshold: f64) -> Self {
        self.ssr_threshold = threshold;
        self
    }

    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Sets the factor used by [`DegeneratePolicy::Cap`].
    pub fn with_max_factor(mut self, max: Option<f64>) -> Self {
        self.max_factor = max;
        self
    }

    /// Enables frequency adaptation with the given dry-day threshold.
    pub fn with_adapt_freq(mut self, threshold: Option<f64>) -> Self {
        self.adapt_freq_threshold = threshold;
        self
    }

    pub fn with_grid_side(mut self, side: GridSide) -> Self {
        self.grid_side = side;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the random seed for SSR and frequency adaptation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Accessors ---

    pub fn scaling(&self) -> ScalingMode {
        self.scaling
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }

    pub fn ssr(&self) -> bool {
        self.ssr
    }

    pub fn ssr_threshold(&self) -> f64 {
        self.ssr_threshold
    }

    pub fn degenerate_policy(&self) -> DegeneratePolicy {
        self.degenerate_policy
    }

    pub fn max_factor(&self) -> Option<f64> {
        self.max_factor
    }

    pub fn adapt_freq(&self) -> Option<f64> {
        self.adapt_freq_threshold
    }

    pub fn grid_side(&self) -> GridSide {
        self.grid_side
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Validates this configuration.
    ///
    /// Checks the grouping window, `n_quantiles >= 1`, positive finite
    /// thresholds and cap, that [`DegeneratePolicy::Cap`] has a
    /// `max_factor`, and that frequency adaptation is only requested with
    /// multiplicative scaling.
    pub fn validate(&self) -> Result<(), QuantileMapError> {
        self.grouping.validate()?;

        if self.n_quantiles < 1 {
            return Err(QuantileMapError::config(
                "n_quantiles",
                format!("must be >= 1, got {}", self.n_quantiles),
            ));
        }

        check_positive("ssr_threshold", self.ssr_threshold)?;

        if let Some(max) = self.max_factor {
            check_positive("max_factor", max)?;
        }

        if self.degenerate_policy == DegeneratePolicy::Cap && self.max_factor.is_none() {
            return Err(QuantileMapError::config(
                "degenerate_policy",
                "the cap policy requires max_factor",
            ));
        }

        if let Some(threshold) = self.adapt_freq_threshold {
            check_positive("adapt_freq", threshold)?;
            if self.scaling != ScalingMode::Multiplicative {
                return Err(QuantileMapError::config(
                    "adapt_freq",
                    "frequency adaptation requires multiplicative scaling",
                ));
            }
        }

        Ok(())
    }
}

/// Configuration for [`adjust`](crate::adjust) and
/// [`adjust_field`](crate::adjust_field).
///
/// # Example
///
/// ```
/// use qqscale_quantile_map::{AdjustConfig, Interpolation};
///
/// let config = AdjustConfig::new()
///     .with_interpolation(Interpolation::Linear)
///     .with_valid_range(Some(0.0), None);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct AdjustConfig {
    method: AdjustMethod,
    interpolation: Interpolation,
    extrapolation: Extrapolation,
    max_factor: Option<f64>,
    valid_min: Option<f64>,
    valid_max: Option<f64>,
    ssr: bool,
    ssr_threshold: f64,
    ref_time: bool,
    output_slice: Option<(NaiveDate, NaiveDate)>,
    output_grid: OutputGrid,
    failure_policy: FailurePolicy,
    seed: u64,
}

impl AdjustConfig {
    /// Creates a new configuration with defaults.
    ///
    /// Defaults: `method = Eqm`, `interpolation = Nearest`,
    /// `extrapolation = Constant`, no cap, no clipping, `ssr = false`,
    /// `ssr_threshold = 8.64e-4`, `ref_time = false`, no output slice,
    /// `output_grid = Input`, `failure_policy = Abort`, `seed = 0`.
    pub fn new() -> Self {
        Self {
            method: AdjustMethod::Eqm,
            interpolation: Interpolation::Nearest,
            extrapolation: Extrapolation::Constant,
            max_factor: None,
            valid_min: None,
            valid_max: None,
            ssr: false,
            ssr_threshold: DEFAULT_SSR_THRESHOLD,
            ref_time: false,
            output_slice: None,
            output_grid: OutputGrid::Input,
            failure_policy: FailurePolicy::Abort,
            seed: 0,
        }
    }

    // --- Builder methods ---

    pub fn with_method(mut self, method: AdjustMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Caps factors before they are applied.
    pub fn with_max_factor(mut self, max: Option<f64>) -> Self {
        self.max_factor = max;
        self
    }

    /// Clips adjusted values to `[min, max]`; either bound may be absent.
    pub fn with_valid_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.valid_min = min;
        self.valid_max = max;
        self
    }

    /// Applies SSR before and reverses it after the adjustment.
    pub fn with_ssr(mut self, ssr: bool) -> Self {
        self.ssr = ssr;
        self
    }

    pub fn with_ssr_threshold(mut self, threshold: f64) -> Self {
        self.ssr_threshold = threshold;
        self
    }

    /// Shifts output dates so they start at the reference period start.
    pub fn with_ref_time(mut self, ref_time: bool) -> Self {
        self.ref_time = ref_time;
        self
    }

    /// Keeps only output dates within `[start, end]`.
    pub fn with_output_slice(mut self, slice: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.output_slice = slice;
        self
    }

    pub fn with_output_grid(mut self, grid: OutputGrid) -> Self {
        self.output_grid = grid;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Accessors ---

    pub fn method(&self) -> AdjustMethod {
        self.method
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    pub fn max_factor(&self) -> Option<f64> {
        self.max_factor
    }

    pub fn valid_min(&self) -> Option<f64> {
        self.valid_min
    }

    pub fn valid_max(&self) -> Option<f64> {
        self.valid_max
    }

    pub fn ssr(&self) -> bool {
        self.ssr
    }

    pub fn ssr_threshold(&self) -> f64 {
        self.ssr_threshold
    }

    pub fn ref_time(&self) -> bool {
        self.ref_time
    }

    pub fn output_slice(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.output_slice
    }

    pub fn output_grid(&self) -> OutputGrid {
        self.output_grid
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), QuantileMapError> {
        if let Some(max) = self.max_factor {
            check_positive("max_factor", max)?;
        }
        check_positive("ssr_threshold", self.ssr_threshold)?;

        for (name, bound) in [("valid_min", self.valid_min), ("valid_max", self.valid_max)] {
            if bound.is_some_and(|v| !v.is_finite()) {
                return Err(QuantileMapError::config(name, "must be finite"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.valid_min, self.valid_max) {
            if lo > hi {
                return Err(QuantileMapError::config(
                    "valid_min",
                    format!("must not exceed valid_max ({lo} > {hi})"),
                ));
            }
        }

        if let Some((start, end)) = self.output_slice {
            if start > end {
                return Err(QuantileMapError::config(
                    "output_slice",
                    format!("start {start} is after end {end}"),
                ));
            }
        }

        Ok(())
    }
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self::new()
    }
}
