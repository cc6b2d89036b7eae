//! Prepare the per-stage file lists (`-b`, `-d`, `-bd`, ...) for a set of frames.
//!
//! ```text
//! calib_prep_lists -l observations.lst
//! calib_prep_lists -d /data/20250531 --out-dir lists
//! calib_prep_lists -a 20250531.tar.gz
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use ccdcal::{archive, cli, file_list};

#[derive(Parser, Debug)]
#[command(about = "Prepare calibration file lists for FITS frames", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["list", "directory", "archive"])))]
struct Args {
    /// Existing list file with FITS names
    #[arg(short, long)]
    list: Option<PathBuf>,

    /// Directory containing FITS files
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Zip or tar(.gz) archive containing FITS files
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Directory the lists are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(flatten)]
    log: cli::LogArgs,
}

/// Base name for the lists: the list file's stem or the directory's name.
fn base_name(path: &Path, is_dir: bool) -> anyhow::Result<String> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve '{}'", path.display()))?;
    let name = if is_dir { path.file_name() } else { path.file_stem() };
    match name {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => bail!("Cannot derive a list name from '{}'", path.display()),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.log.init()?;

    let (base, originals) = match (&args.list, &args.directory, &args.archive) {
        (Some(list), _, _) => {
            if !list.is_file() {
                bail!("List file '{}' not found", list.display());
            }
            (base_name(list, false)?, file_list::read_list(list)?)
        }
        (None, Some(dir), _) => {
            if !dir.is_dir() {
                bail!("Directory '{}' not found", dir.display());
            }
            // names relative to the directory
            let originals: Vec<PathBuf> = file_list::fits_files_in_dir(dir)?
                .iter()
                .filter_map(|p| p.file_name().map(PathBuf::from))
                .collect();
            if originals.is_empty() {
                bail!("No FITS files found in '{}'", dir.display());
            }
            (base_name(dir, true)?, originals)
        }
        (None, None, Some(path)) => {
            if !path.is_file() {
                bail!("Archive '{}' not found", path.display());
            }
            let Some(base) = archive::archive_base_name(path) else {
                bail!("Cannot derive a list name from '{}'", path.display());
            };
            // member names relative to the archive root
            let scratch = tempfile::tempdir().context("Failed to create a scratch directory")?;
            let originals = archive::extract_fits(path, scratch.path())?;
            if originals.is_empty() {
                bail!("No FITS files found inside archive '{}'", path.display());
            }
            (base, originals)
        }
        (None, None, None) => bail!("One of --list, --directory or --archive is required"),
    };

    file_list::write_derived_lists(&args.out_dir, &base, &originals)?;
    Ok(())
}
