//! Pure conversion functions: TOML config structs -> crate API config types.

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use qqscale_calendar::parse_date;
use qqscale_io::{Compression, ReaderConfig, WriterConfig};
use qqscale_quantile_map::{
    AdjustConfig, FailurePolicy, MeanChangeConfig, NearestNeighbour, Regridder, TrainConfig,
};

use crate::config::*;

/// Parses a lowercase option value, naming the config key on failure.
pub fn parse_option<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
}

/// Converts a `[start, end]` pair of `YYYY-MM-DD` strings.
pub fn parse_period(period: &PeriodToml) -> Result<(NaiveDate, NaiveDate)> {
    let start = parse_date(&period[0]).context("invalid period start")?;
    let end = parse_date(&period[1]).context("invalid period end")?;
    if start > end {
        bail!("period start {start} is after end {end}");
    }
    Ok((start, end))
}

/// Builds the regridder named by `method`, if any.
pub fn build_regridder(method: Option<&str>) -> Result<Option<Box<dyn Regridder>>> {
    match method.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("nearest") => Ok(Some(Box::new(NearestNeighbour))),
        Some(other) => bail!("unknown regrid method: {other:?} (expected nearest)"),
    }
}

/// Builds a [`ReaderConfig`] from the I/O section, restricted to `period`.
pub fn build_reader_config(io: &IoToml, period: Option<&PeriodToml>) -> Result<ReaderConfig> {
    let bounds = period.map(parse_period).transpose()?;
    let cfg = ReaderConfig::new(&io.variable)
        .with_time_bounds(bounds.map(|b| b.0), bounds.map(|b| b.1))
        .with_input_units(io.input_units.clone())
        .with_output_units(io.output_units.clone())
        .with_drop_leap_days(io.drop_leap_days);
    cfg.validate()?;
    Ok(cfg)
}

/// Builds the reader for a field of maximum values: `variable` instead of
/// the configured one, no unit override, converted to `units` if given.
pub fn build_max_reader_config(
    io: &IoToml,
    variable: Option<&str>,
    units: Option<&str>,
) -> Result<ReaderConfig> {
    let cfg = ReaderConfig::new(variable.unwrap_or(&io.variable))
        .with_output_units(units.map(str::to_string))
        .with_drop_leap_days(io.drop_leap_days);
    cfg.validate()?;
    Ok(cfg)
}

/// Builds a [`WriterConfig`] from the I/O section.
pub fn build_writer_config(io: &IoToml) -> Result<WriterConfig> {
    let compression: Compression = parse_option("io.compression", &io.compression)?;
    Ok(WriterConfig::new(&io.variable)
        .with_compression(compression)
        .with_row_group_size(io.row_group_size))
}

/// Builds a [`TrainConfig`] from the train section.
pub fn build_train_config(config: &QqscaleConfig) -> Result<TrainConfig> {
    let train = &config.train;
    let failure_policy: FailurePolicy = parse_option("failure_policy", &config.failure_policy)?;
    let cfg = TrainConfig::new(parse_option("train.scaling", &train.scaling)?)
        .with_grouping(parse_option("train.grouping", &train.grouping)?)
        .with_n_quantiles(train.n_quantiles)
        .with_ssr(train.ssr)
        .with_ssr_threshold(train.ssr_threshold)
        .with_degenerate_policy(parse_option(
            "train.degenerate_policy",
            &train.degenerate_policy,
        )?)
        .with_max_factor(train.max_factor)
        .with_adapt_freq(train.adapt_freq)
        .with_grid_side(parse_option("train.grid_side", &train.grid_side)?)
        .with_failure_policy(failure_policy)
        .with_seed(config.seed.unwrap_or(0));
    cfg.validate()?;
    Ok(cfg)
}

/// Builds an [`AdjustConfig`] from the adjust section.
pub fn build_adjust_config(config: &QqscaleConfig) -> Result<AdjustConfig> {
    let adjust = &config.adjust;
    let failure_policy: FailurePolicy = parse_option("failure_policy", &config.failure_policy)?;
    let output_slice = adjust.output_slice.as_ref().map(parse_period).transpose()?;
    let cfg = AdjustConfig::new()
        .with_method(parse_option("adjust.method", &adjust.method)?)
        .with_interpolation(parse_option("adjust.interpolation", &adjust.interpolation)?)
        .with_extrapolation(parse_option("adjust.extrapolation", &adjust.extrapolation)?)
        .with_max_factor(adjust.max_factor)
        .with_valid_range(adjust.valid_min, adjust.valid_max)
        .with_ssr(adjust.ssr)
        .with_ssr_threshold(adjust.ssr_threshold)
        .with_ref_time(adjust.ref_time)
        .with_output_slice(output_slice)
        .with_output_grid(parse_option("adjust.output_grid", &adjust.output_grid)?)
        .with_failure_policy(failure_policy)
        .with_seed(config.seed.unwrap_or(0));
    cfg.validate()?;
    Ok(cfg)
}

/// Builds a [`MeanChangeConfig`]; scaling falls back to the train section.
pub fn build_mean_change_config(config: &QqscaleConfig) -> Result<MeanChangeConfig> {
    let scaling = config
        .mean_change
        .scaling
        .as_deref()
        .unwrap_or(&config.train.scaling);
    Ok(MeanChangeConfig::new(parse_option("mean_change.scaling", scaling)?)
        .with_grouping(parse_option("mean_change.grouping", &config.mean_change.grouping)?)
        .with_failure_policy(parse_option("failure_policy", &config.failure_policy)?))
}
