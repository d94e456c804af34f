mod adjust_cmd;
mod cli;
mod clip_cmd;
mod config;
mod convert;
mod logging;
mod match_cmd;
mod quantiles_cmd;
mod ssr_cmd;
mod train_cmd;

use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use qqscale_quantile_map::FailedCell;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Train(args) => train_cmd::run(args),
        Command::Adjust(args) => adjust_cmd::run(args),
        Command::Ssr(args) => ssr_cmd::run(args),
        Command::Quantiles(args) => quantiles_cmd::run(args),
        Command::MatchMean(args) => match_cmd::run(args),
        Command::ClipMax(args) => clip_cmd::run(args),
    }
}

/// Summarises cells left missing under `mark-missing`.
pub(crate) fn report_failed(step: &str, failed: &[FailedCell]) {
    if failed.is_empty() {
        return;
    }
    warn!(step, failed = failed.len(), "some grid cells were left missing");
    for cell in failed {
        eprintln!(
            "{step}: cell {} ({}, {}) failed: {}",
            cell.index, cell.lat, cell.lon, cell.error
        );
    }
}
