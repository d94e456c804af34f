//! Clip-max command: cap data at a field of maximum valid values.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use qqscale_io::{align_units, read_field, write_field};
use qqscale_quantile_map::clip_to_max_field;

use crate::cli::ClipMaxArgs;
use crate::convert;

/// Run clipping against the maximum field.
pub fn run(args: ClipMaxArgs) -> Result<()> {
    let _cmd = info_span!("clip_max").entered();
    let config = args.common.load_config()?;
    let regridder = convert::build_regridder(config.regrid.as_deref())?;
    let reader = convert::build_reader_config(&config.io, None)?;
    let writer = convert::build_writer_config(&config.io)?;

    let data = read_field(&args.input, &reader)
        .with_context(|| format!("failed to read input: {}", args.input.display()))?;
    let max_reader =
        convert::build_max_reader_config(&config.io, args.max_variable.as_deref(), data.units())?;
    let max = read_field(&args.max, &max_reader)
        .with_context(|| format!("failed to read maximum values: {}", args.max.display()))?;
    let max = align_units(max, data.units());

    let clipped =
        clip_to_max_field(&data, &max, regridder.as_deref()).context("clipping failed")?;

    write_field(&args.output, &clipped, &writer)
        .with_context(|| format!("failed to write output: {}", args.output.display()))?;
    info!(cells = clipped.len(), output = %args.output.display(), "clipping complete");
    Ok(())
}
