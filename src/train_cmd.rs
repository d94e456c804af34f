//! Train command: derive adjustment factors from historical and reference data.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use qqscale_calendar::format_date;
use qqscale_io::{read_field, write_factors};
use qqscale_quantile_map::train_field;

use crate::cli::TrainArgs;
use crate::config::QqscaleConfig;
use crate::{convert, report_failed};

fn merge(args: &TrainArgs, config: &mut QqscaleConfig) {
    if let Some(ref s) = args.scaling {
        config.train.scaling = s.clone();
    }
    if let Some(ref g) = args.grouping {
        config.train.grouping = g.clone();
    }
    if let Some(n) = args.n_quantiles {
        config.train.n_quantiles = n;
    }
    if args.ssr {
        config.train.ssr = true;
    }
    if args.adapt_freq.is_some() {
        config.train.adapt_freq = args.adapt_freq;
    }
}

/// Run the training pipeline.
pub fn run(args: TrainArgs) -> Result<()> {
    let _cmd = info_span!("train").entered();
    let mut config = args.common.load_config()?;
    merge(&args, &mut config);

    if args.adapted_output.is_some() && config.train.adapt_freq.is_none() {
        bail!("--adapted-output needs a frequency adaptation threshold ([train].adapt_freq)");
    }

    let train_cfg = convert::build_train_config(&config)?;
    let regridder = convert::build_regridder(config.regrid.as_deref())?;
    let hist_reader =
        convert::build_reader_config(&config.io, config.train.historical_period.as_ref())?;
    let ref_reader =
        convert::build_reader_config(&config.io, config.train.reference_period.as_ref())?;

    let historical = read_field(&args.historical, &hist_reader)
        .with_context(|| format!("failed to read historical data: {}", args.historical.display()))?;
    let reference = read_field(&args.reference, &ref_reader)
        .with_context(|| format!("failed to read reference data: {}", args.reference.display()))?;

    let trained = train_field(&historical, &reference, &train_cfg, regridder.as_deref())
        .context("training failed")?;
    report_failed("train", trained.failed());

    write_factors(&args.output, trained.factors())
        .with_context(|| format!("failed to write factors: {}", args.output.display()))?;
    if let (Some(path), Some(adapted)) = (&args.adapted_output, trained.frequency_adapted()) {
        write_factors(path, adapted)
            .with_context(|| format!("failed to write factors: {}", path.display()))?;
    }

    if let Some(set) = trained.factors().first() {
        let (h, r) = (set.historical_period(), set.reference_period());
        info!(
            historical = %format!("{}..{}", format_date(h.start), format_date(h.end)),
            reference = %format!("{}..{}", format_date(r.start), format_date(r.end)),
            "training periods"
        );
    }
    info!(
        cells = trained.factors().len(),
        failed = trained.failed().len(),
        output = %args.output.display(),
        "training complete"
    );
    Ok(())
}
