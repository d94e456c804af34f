//! Adjust command: apply trained factors to target data.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use qqscale_io::{align_units, read_factors, read_field, write_field};
use qqscale_quantile_map::adjust_field;

use crate::cli::AdjustArgs;
use crate::config::QqscaleConfig;
use crate::{convert, report_failed};

fn merge(args: &AdjustArgs, config: &mut QqscaleConfig) {
    if let Some(ref m) = args.method {
        config.adjust.method = m.clone();
    }
    if let Some(ref i) = args.interpolation {
        config.adjust.interpolation = i.clone();
    }
    if args.ssr {
        config.adjust.ssr = true;
    }
    if args.valid_min.is_some() {
        config.adjust.valid_min = args.valid_min;
    }
    if args.valid_max.is_some() {
        config.adjust.valid_max = args.valid_max;
    }
}

/// Run the adjustment pipeline.
pub fn run(args: AdjustArgs) -> Result<()> {
    let _cmd = info_span!("adjust").entered();
    let mut config = args.common.load_config()?;
    merge(&args, &mut config);

    let adjust_cfg = convert::build_adjust_config(&config)?;
    let regridder = convert::build_regridder(config.regrid.as_deref())?;
    let reader = convert::build_reader_config(&config.io, config.adjust.target_period.as_ref())?;
    let writer = convert::build_writer_config(&config.io)?;

    let factors = read_factors(&args.factors)
        .with_context(|| format!("failed to read factors: {}", args.factors.display()))?;
    let target = read_field(&args.target, &reader)
        .with_context(|| format!("failed to read target data: {}", args.target.display()))?;
    let target = align_units(target, factors.first().and_then(|f| f.units()));

    let adjusted = adjust_field(&target, &factors, &adjust_cfg, regridder.as_deref())
        .context("adjustment failed")?;
    report_failed("adjust", adjusted.failed());

    write_field(&args.output, adjusted.field(), &writer)
        .with_context(|| format!("failed to write adjusted data: {}", args.output.display()))?;

    info!(
        cells = adjusted.field().len(),
        failed = adjusted.failed().len(),
        output = %args.output.display(),
        "adjustment complete"
    );
    Ok(())
}
