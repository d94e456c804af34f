//! SSR command: apply or reverse singularity stochastic removal on a field.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use qqscale_io::{read_field, write_field};
use qqscale_quantile_map::{apply_ssr_field, reverse_ssr_field};

use crate::cli::SsrArgs;
use crate::convert;

/// Run SSR over every cell of the input.
pub fn run(args: SsrArgs) -> Result<()> {
    let _cmd = info_span!("ssr", reverse = args.reverse).entered();
    let config = args.common.load_config()?;
    let threshold = args.threshold.unwrap_or(config.train.ssr_threshold);

    let reader = convert::build_reader_config(&config.io, None)?;
    let writer = convert::build_writer_config(&config.io)?;
    let field = read_field(&args.input, &reader)
        .with_context(|| format!("failed to read input: {}", args.input.display()))?;

    let out = if args.reverse {
        reverse_ssr_field(&field, threshold)
    } else {
        apply_ssr_field(&field, threshold, config.seed.unwrap_or(0))
    }
    .context("SSR failed")?;

    write_field(&args.output, &out, &writer)
        .with_context(|| format!("failed to write output: {}", args.output.display()))?;
    info!(threshold, cells = out.len(), output = %args.output.display(), "SSR complete");
    Ok(())
}
