//! Subtract a master bias from every listed frame.
//!
//! ```text
//! bias_correction night1.lst night1-b.lst work/masterbias.fits config.ini
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ccdcal::{cli, correction, file_list};

#[derive(Parser, Debug)]
#[command(about = "Apply bias correction to a list of frames", long_about = None)]
struct Args {
    /// Input frame list
    list_in: PathBuf,

    /// Output list of corrected frames
    list_out: PathBuf,

    /// Master bias frame
    masterbias: PathBuf,

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
    let report = correction::apply_bias_correction(&inputs, &args.masterbias, &settings)?;
    report.write_list(&args.list_out)?;
    Ok(())
}
