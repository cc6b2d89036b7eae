//! Divide every listed object frame by the normalised master flat of its filter.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ccdcal::{cli, correction, file_list};

#[derive(Parser, Debug)]
#[command(about = "Apply flat correction to a list of frames", long_about = None)]
struct Args {
    /// Input frame list
    list_in: PathBuf,

    /// Output list of corrected frames
    list_out: PathBuf,

    /// Configuration file
    #[arg(default_value = cli::DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(flatten)]
    log: cli::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = cli::init_with_config(&args.config, args.log.verbose)?;

    let inputs = file_list::read_list(&args.list_in)
        .with_context(|| format!("Failed to read input list '{}'", args.list_in.display()))?;
    match correction::apply_flat_correction(&inputs, &settings)? {
        Some(report) => report.write_list(&args.list_out)?,
        None => tracing::info!(list = %args.list_out.display(), "Flat correction disabled, no list written"),
    }
    Ok(())
}
