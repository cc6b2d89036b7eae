//! Bias, dark and flat correction of listed frames.
//!
//! Every corrected frame is written next to its input with the stage letter
//! added to the file name (see [`derive_output_path`]). Inputs are never
//! overwritten: a frame whose header already records the stage is skipped.
//! Failures on single files are logged and counted; the batch always runs to
//! the end.

mod stages;


use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::CalibSettings;
use crate::file_list;
use crate::frame::Frame;
use crate::masters::master_flat_names;
use crate::{Error, Result};

pub use stages::{derive_output_path, Stage, Stages};

/// What happened to each input of a correction batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Output paths in input order.
    pub written: Vec<PathBuf>,
    /// Frames of a kind this stage does not apply to.
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    /// Write the output list, one path per line.
    pub fn write_list(&self, path: &Path) -> Result<()> {
        file_list::write_list(path, &self.written)
    }
}

/// Per-frame decision of a correction step.
enum Correction {
    Corrected(Frame),
    NotApplicable,
}

fn run_batch<P, F>(inputs: &[P], stage: Stage, mut correct: F) -> BatchReport
where
    P: AsRef<Path>,
    F: FnMut(&Path, Frame) -> Result<Correction>,
{
    let mut report = BatchReport::default();
    for path in inputs {
        let path = path.as_ref();
        let frame = match Frame::load(path) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "Skipping");
                report.failed += 1;
                continue;
            }
        };

        let applied = Stages::from_header(&frame.header);
        if applied.contains(stage) {
            tracing::warn!(file = %path.display(), %stage, "Already corrected, skipping");
            report.skipped += 1;
            continue;
        }

        match correct(path, frame) {
            Ok(Correction::Corrected(frame)) => {
                let output = derive_output_path(path, applied, stage);
                match frame.save(&output) {
                    Ok(()) => {
                        tracing::debug!(input = %path.display(), output = %output.display(), %stage, "Corrected");
                        report.written.push(output);
                    }
                    Err(err) => {
                        tracing::warn!(file = %output.display(), error = %err, "Failed to write corrected frame");
                        report.failed += 1;
                    }
                }
            }
            Ok(Correction::NotApplicable) => report.skipped += 1,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "Skipping");
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        %stage,
        written = report.written.len(),
        skipped = report.skipped,
        failed = report.failed,
        "Correction finished"
    );
    report
}

fn master_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn image_type(path: &Path, frame: &Frame, settings: &CalibSettings) -> Result<String> {
    let keyword = &settings.labels.image_type_keyword;
    frame.image_type(keyword).ok_or_else(|| Error::MissingKeyword {
        path: path.to_path_buf(),
        keyword: keyword.clone(),
    })
}

/// Subtract `master_bias` from every listed frame that is not itself a bias.
pub fn apply_bias_correction<P: AsRef<Path>>(
    inputs: &[P],
    master_bias: &Path,
    settings: &CalibSettings,
) -> Result<BatchReport> {
    let bias = Frame::load(master_bias)?;
    let name = master_name(master_bias);
    tracing::info!(master = %master_bias.display(), frames = inputs.len(), "Applying bias correction");

    Ok(run_batch(inputs, Stage::Bias, |path, mut frame| {
        if image_type(path, &frame, settings)? == settings.labels.bias {
            return Ok(Correction::NotApplicable);
        }
        frame.subtract(&bias)?;
        frame.header.set(Stage::Bias.header_keyword(), name.as_str());
        Ok(Correction::Corrected(frame))
    }))
}

/// Subtract `exptime * master_dark` from every listed frame that is neither a
/// bias nor a dark. The master dark is per second of exposure.
pub fn apply_dark_correction<P: AsRef<Path>>(
    inputs: &[P],
    master_dark: &Path,
    settings: &CalibSettings,
) -> Result<BatchReport> {
    let dark = Frame::load(master_dark)?;
    let name = master_name(master_dark);
    let exposure_keyword = &settings.labels.exposure_keyword;
    tracing::info!(master = %master_dark.display(), frames = inputs.len(), "Applying dark correction");

    Ok(run_batch(inputs, Stage::Dark, |path, mut frame| {
        let image_type = image_type(path, &frame, settings)?;
        if image_type == settings.labels.bias || image_type == settings.labels.dark {
            return Ok(Correction::NotApplicable);
        }
        let exposure = frame
            .exposure_time(exposure_keyword)
            .ok_or_else(|| Error::MissingKeyword {
                path: path.to_path_buf(),
                keyword: exposure_keyword.clone(),
            })?;
        frame.subtract_scaled(&dark, exposure as f32)?;
        frame.header.set(Stage::Dark.header_keyword(), name.as_str());
        Ok(Correction::Corrected(frame))
    }))
}

/// Divide every listed object frame by the normalised master flat of its
/// filter, read from `working_dir`. Master flats are loaded once per filter.
///
/// Returns `None` without touching any file when flat correction is disabled
/// in the configuration.
pub fn apply_flat_correction<P: AsRef<Path>>(
    inputs: &[P],
    settings: &CalibSettings,
) -> Result<Option<BatchReport>> {
    if !settings.flat_correction {
        tracing::info!("Flat correction is disabled in the configuration");
        return Ok(None);
    }

    let filter_keyword = &settings.labels.filter_keyword;
    let mut flats: HashMap<String, Frame> = HashMap::new();
    tracing::info!(frames = inputs.len(), dir = %settings.working_dir.display(), "Applying flat correction");

    Ok(Some(run_batch(inputs, Stage::Flat, |path, mut frame| {
        if image_type(path, &frame, settings)? != settings.labels.object {
            return Ok(Correction::NotApplicable);
        }
        let filter = frame.filter(filter_keyword).ok_or_else(|| Error::MissingKeyword {
            path: path.to_path_buf(),
            keyword: filter_keyword.clone(),
        })?;

        if !settings.is_supported_filter(&filter) {
            tracing::warn!(file = %path.display(), filter, "Unsupported filter, not flat-corrected");
            return Ok(Correction::NotApplicable);
        }

        let (_, norm_name) = master_flat_names(&filter);
        let flat = match flats.entry(filter) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let flat_path = settings.working_dir.join(&norm_name);
                if !flat_path.exists() {
                    return Err(Error::MissingMasterFlat {
                        filter: entry.key().clone(),
                        path: flat_path,
                    });
                }
                let flat = Frame::load(&flat_path)?;
                tracing::debug!(filter = %entry.key(), file = %flat_path.display(), "Loaded master flat");
                entry.insert(flat)
            }
        };
        frame.divide(flat)?;
        frame.header.set(Stage::Flat.header_keyword(), norm_name);
        Ok(Correction::Corrected(frame))
    })))
}
