//! List the FITS files of a directory.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use ccdcal::{cli, file_list};

#[derive(Parser, Debug)]
#[command(about = "Write the FITS files of a directory to a list", long_about = None)]
struct Args {
    /// Directory to scan (not recursive)
    directory: PathBuf,

    /// Output list file
    #[arg(short, long, default_value = "fits_list.txt")]
    output: PathBuf,

    #[command(flatten)]
    log: cli::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.log.init()?;

    if !args.directory.is_dir() {
        bail!("'{}' is not a valid directory", args.directory.display());
    }
    let files = file_list::fits_files_in_dir(&args.directory)?;
    if files.is_empty() {
        tracing::warn!(dir = %args.directory.display(), "No FITS files found in the directory");
        return Ok(());
    }
    file_list::write_list(&args.output, &files)?;
    tracing::info!(file = %args.output.display(), count = files.len(), "List saved");
    Ok(())
}
