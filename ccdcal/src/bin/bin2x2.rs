//! 2x2-bin every FITS file of a directory.

use std::path::PathBuf;

use clap::Parser;
use ccdcal::{binning, cli};

#[derive(Parser, Debug)]
#[command(about = "Bin FITS frames 2x2 by averaging", long_about = None)]
struct Args {
    /// Directory with the input frames
    input_dir: PathBuf,

    /// Directory for the binned frames
    output_dir: PathBuf,

    #[command(flatten)]
    log: cli::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.log.init()?;

    let outputs = binning::bin_directory(&args.input_dir, &args.output_dir)?;
    tracing::info!(files = outputs.len(), dir = %args.output_dir.display(), "Binning complete");
    Ok(())
}
