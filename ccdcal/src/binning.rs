//! 2x2 software binning of whole directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::{file_list, io_error, Result};

/// Bin one file and write it to `output`, keeping the header.
pub fn bin_file(input: &Path, output: &Path) -> Result<Frame> {
    let frame = Frame::load(input)?;
    let binned = frame.bin_2x2()?;
    binned.save(output)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        width = binned.width(),
        height = binned.height(),
        "Binned and saved"
    );
    Ok(binned)
}

/// Bin every FITS file of `input_dir` into `output_dir` under the same name.
/// Stops at the first file that cannot be binned.
pub fn bin_directory(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;
    let inputs = file_list::fits_files_in_dir(input_dir)?;
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(name);
        bin_file(&input, &output)?;
        outputs.push(output);
    }
    Ok(outputs)
}
