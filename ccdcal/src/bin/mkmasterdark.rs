//! Combine raw dark frames into a master dark normalised to one second.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ccdcal::cli::ConfigArgs;
use ccdcal::file_list;
use ccdcal::masters::{self, DarkOptions, MasterOutcome, DEFAULT_MASTER_DARK};
use ccdcal::preview;

#[derive(Parser, Debug)]
#[command(about = "Create a per-second master dark from a list of frames", long_about = None)]
struct Args {
    /// List of frames to search for dark frames (one path per line)
    #[arg(short, long)]
    list: PathBuf,

    /// Output file name, placed in the working directory
    #[arg(short, long, default_value = DEFAULT_MASTER_DARK)]
    output: PathBuf,

    /// Override the configured combination method
    #[arg(short, long)]
    method: Option<String>,

    /// Master bias subtracted from every dark before scaling
    #[arg(short = 'b', long)]
    masterbias: Option<PathBuf>,

    /// Write a PNG preview next to the master dark
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
    let options = DarkOptions {
        method: args.method,
        master_bias: args.masterbias,
        output: args.output,
    };

    if let MasterOutcome::Written(master) = masters::build_master_dark(&paths, &settings, &options)? {
        if args.png {
            preview::write_png(&master.frame, &preview::preview_path(&master.path))?;
        }
    }
    Ok(())
}
