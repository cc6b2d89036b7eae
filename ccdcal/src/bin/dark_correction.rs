//! Subtract an exposure-scaled master dark from every listed frame.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ccdcal::{cli, correction, file_list};

#[derive(Parser, Debug)]
#[command(about = "Apply dark correction to a list of frames", long_about = None)]
struct Args {
    /// Input frame list
    list_in: PathBuf,

    /// Output list of corrected frames
    list_out: PathBuf,

    /// Per-second master dark frame
    masterdark: PathBuf,

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
    let report = correction::apply_dark_correction(&inputs, &args.masterdark, &settings)?;
    report.write_list(&args.list_out)?;
    Ok(())
}
