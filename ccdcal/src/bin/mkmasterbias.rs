//! Combine raw bias frames into a master bias.
//!
//! ```text
//! mkmasterbias -l bias.lst -s 3.0 -o masterbias.fits -p
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ccdcal::cli::ConfigArgs;
use ccdcal::file_list;
use ccdcal::masters::{self, BiasOptions, MasterOutcome, DEFAULT_MASTER_BIAS};
use ccdcal::preview;

#[derive(Parser, Debug)]
#[command(about = "Create a master bias from a list of frames", long_about = None)]
struct Args {
    /// List of frames to search for bias frames (one path per line)
    #[arg(short, long)]
    list: PathBuf,

    /// Override the configured combination method
    #[arg(short, long)]
    method: Option<String>,

    /// Sigma for outlier rejection, overrides the configured value
    #[arg(short, long)]
    sigma: Option<f64>,

    /// Output file name, placed in the working directory
    #[arg(short, long, default_value = DEFAULT_MASTER_BIAS)]
    output: PathBuf,

    /// Write a PNG preview next to the master bias
    #[arg(short, long)]
    png: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.config.init()?;

    let paths = file_list::read_list(&args.list)
        .with_context(|| format!("Failed to read frame list '{}'", args.list.display()))?;
    let options = BiasOptions {
        method: args.method,
        sigma: args.sigma,
        output: args.output,
    };

    if let MasterOutcome::Written(master) = masters::build_master_bias(&paths, &settings, &options)? {
        if args.png {
            preview::write_png(&master.frame, &preview::preview_path(&master.path))?;
        }
    }
    Ok(())
}
