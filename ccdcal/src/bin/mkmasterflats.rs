//! Build raw and normalised master flats for every filter found.

use std::path::PathBuf;

use clap::Parser;
use ccdcal::cli::ConfigArgs;
use ccdcal::file_list;
use ccdcal::masters::{self, FlatOptions, MasterOutcome};

#[derive(Parser, Debug)]
#[command(about = "Create per-filter master flats", long_about = None)]
struct Args {
    /// Flat frames, or list files (.lst/.txt) of them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Master bias subtracted from every flat
    #[arg(short = 'b', long)]
    masterbias: Option<PathBuf>,

    /// Per-second master dark, scaled by each flat's exposure and subtracted
    #[arg(short = 'd', long)]
    masterdark: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.config.init()?;

    let paths = file_list::expand_inputs(&args.inputs)?;
    let options = FlatOptions {
        master_bias: args.masterbias,
        master_dark: args.masterdark,
    };
    if let MasterOutcome::Written(flats) = masters::build_master_flats(&paths, &settings, &options)? {
        tracing::info!(filters = flats.len(), "Master flats complete");
    }
    Ok(())
}
