//! Match-mean command: correct the mean-change drift of quantile-mapped data.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span};

use qqscale_io::{ReaderConfig, read_field, write_field};
use qqscale_quantile_map::{Field, match_mean_change_field};

use crate::cli::MatchMeanArgs;
use crate::{convert, report_failed};

fn read(path: &Path, what: &str, reader: &ReaderConfig) -> Result<Field> {
    debug!(path = %path.display(), what, "reading");
    read_field(path, reader)
        .with_context(|| format!("failed to read {what} data: {}", path.display()))
}

/// Run mean-change matching.
pub fn run(args: MatchMeanArgs) -> Result<()> {
    let _cmd = info_span!("match_mean").entered();
    let mut config = args.common.load_config()?;
    if let Some(ref s) = args.scaling {
        config.mean_change.scaling = Some(s.clone());
    }
    if let Some(ref g) = args.grouping {
        config.mean_change.grouping = g.clone();
    }

    let mc_cfg = convert::build_mean_change_config(&config)?;
    let regridder = convert::build_regridder(config.regrid.as_deref())?;
    let all = convert::build_reader_config(&config.io, None)?;
    let hist_reader =
        convert::build_reader_config(&config.io, config.train.historical_period.as_ref())?;
    let writer = convert::build_writer_config(&config.io)?;

    let adjusted = read(&args.adjusted, "adjusted", &all)?;
    let target = read(&args.target, "target", &all)?;
    let reference = read(&args.reference, "reference", &all)?;
    let historical = read(&args.historical, "historical", &hist_reader)?;

    let matched = match_mean_change_field(
        &adjusted,
        &target,
        &reference,
        &historical,
        &mc_cfg,
        regridder.as_deref(),
    )
    .context("mean-change matching failed")?;
    report_failed("match-mean", matched.failed());

    write_field(&args.output, matched.field(), &writer)
        .with_context(|| format!("failed to write output: {}", args.output.display()))?;
    info!(
        cells = matched.field().len(),
        scaling = %mc_cfg.scaling(),
        grouping = %mc_cfg.grouping(),
        "mean-change matching complete"
    );
    Ok(())
}
