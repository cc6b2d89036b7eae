//! Write ratios of consecutive normalised flats per filter.

use std::path::PathBuf;

use clap::Parser;
use ccdcal::cli::ConfigArgs;
use ccdcal::{file_list, flat_normalisation};

#[derive(Parser, Debug)]
#[command(about = "Compare consecutive flats of each broadband filter", long_about = None)]
struct Args {
    /// Flat frames, or list files (.lst/.txt) of them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.config.init()?;

    let paths = file_list::expand_inputs(&args.inputs)?;
    let report = flat_normalisation::normalise_flats(&paths, &settings)?;
    tracing::info!(ratios = report.outputs.len(), "Flat normalisation complete");
    Ok(())
}
