//! Quantiles command: per-group quantile tables of every cell, as JSON.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use qqscale_io::{read_field, write_quantiles};
use qqscale_quantile_map::{FailurePolicy, Grouping, estimate_quantiles, map_cells};
use qqscale_stats::equally_spaced_nodes;

use crate::cli::QuantilesArgs;
use crate::{convert, report_failed};

/// Estimate quantiles for the input field.
pub fn run(args: QuantilesArgs) -> Result<()> {
    let _cmd = info_span!("quantiles").entered();
    let mut config = args.common.load_config()?;
    if let Some(ref g) = args.grouping {
        config.train.grouping = g.clone();
    }
    if let Some(n) = args.n_quantiles {
        config.train.n_quantiles = n;
    }

    let grouping: Grouping = convert::parse_option("train.grouping", &config.train.grouping)?;
    let policy: FailurePolicy = convert::parse_option("failure_policy", &config.failure_policy)?;
    let nodes = equally_spaced_nodes(config.train.n_quantiles);
    let reader =
        convert::build_reader_config(&config.io, config.train.historical_period.as_ref())?;

    let field = read_field(&args.input, &reader)
        .with_context(|| format!("failed to read input: {}", args.input.display()))?;
    let outcome = map_cells(&field, policy, |_, series| {
        estimate_quantiles(series, &nodes, &grouping)
    })
    .context("quantile estimation failed")?;
    report_failed("quantiles", &outcome.failed);

    write_quantiles(&args.output, &outcome.results)
        .with_context(|| format!("failed to write quantiles: {}", args.output.display()))?;
    info!(
        cells = outcome.results.len(),
        nodes = nodes.len(),
        grouping = %grouping,
        "quantiles written"
    );
    Ok(())
}
