use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::QqscaleConfig;

/// Quantile-mapping bias adjustment of climate model output.
#[derive(Parser)]
#[command(
    name = "qqscale",
    version,
    about = "Quantile-mapping bias adjustment of climate model output"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Train adjustment factors from historical and reference data.
    Train(TrainArgs),
    /// Apply trained adjustment factors to target data.
    Adjust(AdjustArgs),
    /// Apply or reverse singularity stochastic removal.
    Ssr(SsrArgs),
    /// Estimate per-group quantiles of a field.
    Quantiles(QuantilesArgs),
    /// Match the model's mean change in adjusted data.
    MatchMean(MatchMeanArgs),
    /// Cap data at a field of maximum valid values.
    ClipMax(ClipMaxArgs),
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
pub struct CommonArgs {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the variable column from config.
    #[arg(long)]
    pub variable: Option<String>,

    /// Override the RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Keep going when a grid cell fails, leaving it missing.
    #[arg(long)]
    pub mark_missing: bool,
}

impl CommonArgs {
    /// Loads the config file, then applies the shared flag overrides.
    pub fn load_config(&self) -> Result<QqscaleConfig> {
        let mut config = QqscaleConfig::load(self.config.as_deref())?;
        if let Some(ref v) = self.variable {
            config.io.variable = v.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if self.mark_missing {
            config.failure_policy = "mark-missing".to_string();
        }
        Ok(config)
    }
}

/// Arguments for the `train` subcommand.
#[derive(clap::Args)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Model data over the historical period (Parquet).
    #[arg(long)]
    pub historical: PathBuf,

    /// Observations over the reference period (Parquet).
    #[arg(long)]
    pub reference: PathBuf,

    /// Path for the adjustment factors (JSON).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Path for factors trained on frequency-adapted data (JSON).
    #[arg(long)]
    pub adapted_output: Option<PathBuf>,

    /// Override scaling (additive, multiplicative).
    #[arg(long)]
    pub scaling: Option<String>,

    /// Override grouping (none, monthly, <N>monthly, doy:<N>).
    #[arg(long)]
    pub grouping: Option<String>,

    /// Override the number of quantile nodes.
    #[arg(long)]
    pub n_quantiles: Option<usize>,

    /// Apply singularity stochastic removal before training.
    #[arg(long)]
    pub ssr: bool,

    /// Adapt dry-day frequency below this threshold.
    #[arg(long)]
    pub adapt_freq: Option<f64>,
}

/// Arguments for the `adjust` subcommand.
#[derive(clap::Args)]
pub struct AdjustArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Data to adjust (Parquet).
    #[arg(long)]
    pub target: PathBuf,

    /// Adjustment factors written by `train` (JSON).
    #[arg(long)]
    pub factors: PathBuf,

    /// Path for the adjusted data (Parquet).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override method (eqm, qdm).
    #[arg(long)]
    pub method: Option<String>,

    /// Override interpolation (nearest, linear, cubic).
    #[arg(long)]
    pub interpolation: Option<String>,

    /// Apply singularity stochastic removal around the adjustment.
    #[arg(long)]
    pub ssr: bool,

    /// Clip adjusted values below this bound.
    #[arg(long)]
    pub valid_min: Option<f64>,

    /// Clip adjusted values above this bound.
    #[arg(long)]
    pub valid_max: Option<f64>,
}

/// Arguments for the `ssr` subcommand.
#[derive(clap::Args)]
pub struct SsrArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Input data (Parquet).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output data (Parquet).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Set values below the threshold to zero instead.
    #[arg(long)]
    pub reverse: bool,

    /// Override the SSR threshold.
    #[arg(long)]
    pub threshold: Option<f64>,
}

/// Arguments for the `quantiles` subcommand.
#[derive(clap::Args)]
pub struct QuantilesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Input data (Parquet).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path for the quantile tables (JSON).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override grouping.
    #[arg(long)]
    pub grouping: Option<String>,

    /// Override the number of quantile nodes.
    #[arg(long)]
    pub n_quantiles: Option<usize>,
}

/// Arguments for the `match-mean` subcommand.
#[derive(clap::Args)]
pub struct MatchMeanArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Quantile-mapped data (Parquet).
    #[arg(long)]
    pub adjusted: PathBuf,

    /// Data that was adjusted (Parquet).
    #[arg(long)]
    pub target: PathBuf,

    /// Model data over the future period (Parquet).
    #[arg(long)]
    pub reference: PathBuf,

    /// Model data over the historical period (Parquet).
    #[arg(long)]
    pub historical: PathBuf,

    /// Path for the matched data (Parquet).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override scaling.
    #[arg(long)]
    pub scaling: Option<String>,

    /// Override grouping (none, monthly).
    #[arg(long)]
    pub grouping: Option<String>,
}

/// Arguments for the `clip-max` subcommand.
#[derive(clap::Args)]
pub struct ClipMaxArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Data to clip (Parquet).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Maximum valid values (Parquet), converted to the units of the input.
    #[arg(long)]
    pub max: PathBuf,

    /// Variable column in the maximum file [default: the input variable].
    #[arg(long)]
    pub max_variable: Option<String>,

    /// Path for the clipped data (Parquet).
    #[arg(short, long)]
    pub output: PathBuf,
}
