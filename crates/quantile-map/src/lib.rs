//! Empirical and delta quantile mapping for bias adjustment of climate model
//! output.
//!
//! Training compares a historical (model baseline) series against a
//! reference series and stores, for every group of the calendar and every
//! quantile node, the factor that carries one onto the other. Adjustment
//! applies those factors to a target series.
//!
//! # Pipeline
//!
//! 1. **Train**: optional singularity stochastic removal, optional frequency
//!    adaptation, per-group type-7 quantiles, factors `ref_q / hist_q`
//!    (multiplicative) or `ref_q - hist_q` (additive)
//! 2. **Adjust**: look up each value's factor by its own value (EQM) or by
//!    its percent rank within the target (QDM), interpolate, apply, then
//!    reverse SSR and clip
//! 3. **Match mean change** (optional): rescale the adjusted output so that
//!    its change in mean equals the model's
//! 4. **Clip to a maximum field** (optional): cap the output at a gridded
//!    field of physically plausible maxima, see [`clip_to_max_field`]
//!
//! Gridded inputs run the same steps per cell in parallel; see
//! [`train_field`], [`adjust_field`] and [`match_mean_change_field`].
//!
//! # Glossary
//!
//! - **EQM**: empirical quantile mapping, factors indexed by the value's quantile in the historical data
//! - **QDM**: quantile delta mapping, factors indexed by the value's rank in the target data
//! - **SSR**: singularity stochastic removal, replaces exact zeros with small random values
//! - **Node**: a probability at which quantiles are estimated, `(i + 0.5) / n`
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use qqscale_calendar::noleap_sequence;
//! use qqscale_quantile_map::{AdjustConfig, ScalingMode, Series, TrainConfig, adjust, train};
//!
//! let dates = noleap_sequence(NaiveDate::from_ymd_opt(1991, 1, 1).unwrap(), 365);
//! let hist = Series::new(dates.clone(), (0..365).map(|i| i as f64).collect()).unwrap();
//! let reference = hist.map_values(|v| v + 2.0);
//!
//! let trained = train(&hist, &reference, &TrainConfig::new(ScalingMode::Additive)).unwrap();
//! let adjusted = adjust(&hist, trained.primary(), &AdjustConfig::new()).unwrap();
//! ```

mod adjust;
mod clip;
mod config;
mod error;
mod factors;
mod freq;
mod grouping;
pub(crate) mod interp;
mod mean_change;
mod partition;
mod quantiles;
mod regrid;
mod result;
mod series;
mod ssr;
mod train;

pub use adjust::{adjust, adjust_field};
pub use clip::clip_to_max_field;
pub use config::{
    AdjustConfig, AdjustMethod, DegeneratePolicy, Extrapolation, FailurePolicy, GridSide,
    Interpolation, OutputGrid, ScalingMode, TrainConfig,
};
pub use error::QuantileMapError;
pub use factors::{AdjustmentFactorSet, FactorField, GroupFactors, TrainingPeriod};
pub use freq::adapt_frequency;
pub use grouping::{GroupKey, Grouping, WindowUnit};
pub use mean_change::{
    Climatology, MeanChangeConfig, MeanChangeFactors, match_mean_change, match_mean_change_field,
    train_mean_change,
};
pub use partition::{FailedCell, PartitionOutcome, map_cells};
pub use quantiles::{QuantileSet, QuantileTable, estimate_quantiles};
pub use regrid::{NearestNeighbour, Regridder};
pub use result::{Adjusted, AdjustedField, Trained, TrainedField};
pub use series::{Field, Grid, Location, Series};
pub use ssr::{DEFAULT_SSR_THRESHOLD, apply_ssr, apply_ssr_field, reverse_ssr, reverse_ssr_field};
pub use train::{train, train_field};
