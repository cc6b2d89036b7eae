//! Master calibration frame creation: bias, per-second dark and per-filter flats.


use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::combine::{combine, CombineMethod};
use crate::config::{BiasMethod, CalibSettings, DarkMethod};
use crate::frame::Frame;
use crate::{io_error, Error, Result};

pub const DEFAULT_MASTER_BIAS: &str = "masterbias.fits";
pub const DEFAULT_MASTER_DARK: &str = "masterdark.fits";

/// A frame read from disk, kept with its path.
#[derive(Debug, Clone)]
pub struct LoadedFrame {
    pub path: PathBuf,
    pub frame: Frame,
}

/// A master frame that was written to disk.
#[derive(Debug, Clone)]
pub struct Master {
    pub path: PathBuf,
    pub frame: Frame,
}

/// Result of a master build that can be switched off in the configuration.
#[derive(Debug)]
pub enum MasterOutcome<T = Master> {
    Written(T),
    /// The stage is disabled in the configuration; nothing was written.
    Disabled,
}

/// Keep the frames among `paths` whose image type equals `label`.
///
/// Only the header is read to decide; pixels are loaded for matching frames
/// alone. Unreadable files and frames without an image type are logged and
/// skipped. The result is sorted by path.
pub fn select_frames<P: AsRef<Path>>(
    paths: &[P],
    settings: &CalibSettings,
    label: &str,
) -> Vec<LoadedFrame> {
    let label = label.trim().to_uppercase();
    let keyword = &settings.labels.image_type_keyword;

    let mut sorted: Vec<&Path> = paths.iter().map(|p| p.as_ref()).collect();
    sorted.sort();

    let mut selected = Vec::new();
    for path in sorted {
        let header = match Frame::load_header(path) {
            Ok(header) => header,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "Skipping unreadable file");
                continue;
            }
        };
        match header.get_text(keyword).map(|t| t.to_uppercase()) {
            Some(image_type) if image_type == label => match Frame::load(path) {
                Ok(frame) => selected.push(LoadedFrame {
                    path: path.to_path_buf(),
                    frame,
                }),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "Skipping unreadable file");
                }
            },
            Some(image_type) => {
                tracing::debug!(file = %path.display(), image_type, "Not a {} frame", label);
            }
            None => {
                tracing::warn!(file = %path.display(), keyword = %keyword, "Missing image type, skipping");
            }
        }
    }
    tracing::info!(label, selected = selected.len(), "Selected frames");
    selected
}

/// Options for [`build_master_bias`]. `None` fields fall back to the configuration.
#[derive(Debug, Clone)]
pub struct BiasOptions {
    pub method: Option<String>,
    pub sigma: Option<f64>,
    /// Output file name, resolved against `working_dir`.
    pub output: PathBuf,
}

impl Default for BiasOptions {
    fn default() -> Self {
        Self {
            method: None,
            sigma: None,
            output: PathBuf::from(DEFAULT_MASTER_BIAS),
        }
    }
}

/// Combine the bias frames among `paths` into a master bias.
pub fn build_master_bias<P: AsRef<Path>>(
    paths: &[P],
    settings: &CalibSettings,
    options: &BiasOptions,
) -> Result<MasterOutcome> {
    if !settings.bias_subtraction {
        tracing::info!("Bias subtraction is disabled in the configuration");
        return Ok(MasterOutcome::Disabled);
    }

    let method_name = options
        .method
        .as_deref()
        .unwrap_or(settings.bias_method.as_str())
        .trim();
    let method = BiasMethod::from_str(method_name).map_err(|_| Error::UnsupportedMethod {
        kind: "bias",
        method: method_name.to_string(),
    })?;
    let sigma = options.sigma.unwrap_or(settings.bias_sigma);
    if sigma.is_nan() || sigma <= 0.0 {
        return Err(Error::InvalidSigma(sigma));
    }

    let label = &settings.labels.bias;
    let frames: Vec<Frame> = select_frames(paths, settings, label)
        .into_iter()
        .map(|loaded| loaded.frame)
        .collect();

    let combine_method = match method {
        BiasMethod::MedianSigmaClipped => CombineMethod::MedianSigmaClipped {
            sigma: sigma as f32,
        },
    };
    tracing::info!(frames = frames.len(), %method, sigma, "Building master bias");
    let mut master = combine(&frames, combine_method, label)?;

    master.header.set(&settings.labels.image_type_keyword, label.as_str());
    master.header.set("MB_COMB", method.to_string());
    master.header.set("MB_SIGMA", sigma);

    write_master(master, settings.working_dir.join(&options.output)).map(MasterOutcome::Written)
}

/// Options for [`build_master_dark`].
#[derive(Debug, Clone)]
pub struct DarkOptions {
    pub method: Option<String>,
    /// Master bias subtracted from every dark before scaling.
    pub master_bias: Option<PathBuf>,
    pub output: PathBuf,
}

impl Default for DarkOptions {
    fn default() -> Self {
        Self {
            method: None,
            master_bias: None,
            output: PathBuf::from(DEFAULT_MASTER_DARK),
        }
    }
}

/// Combine the dark frames among `paths` into a one-second master dark.
///
/// Each dark is divided by its exposure time before combination, so the
/// result is dark current per second.
pub fn build_master_dark<P: AsRef<Path>>(
    paths: &[P],
    settings: &CalibSettings,
    options: &DarkOptions,
) -> Result<MasterOutcome> {
    if !settings.dark_correction {
        tracing::info!("Dark correction is disabled in the configuration");
        return Ok(MasterOutcome::Disabled);
    }

    let method = options
        .method
        .as_deref()
        .map(DarkMethod::parse_or_default)
        .unwrap_or(settings.dark_method);
    let bias = options
        .master_bias
        .as_ref()
        .map(Frame::load)
        .transpose()?;

    let label = &settings.labels.dark;
    let exposure_keyword = &settings.labels.exposure_keyword;
    let mut scaled = Vec::new();
    for LoadedFrame { path, mut frame } in select_frames(paths, settings, label) {
        let exposure = match frame.exposure_time(exposure_keyword) {
            Some(t) if t > 0.0 && t.is_finite() => t,
            other => {
                tracing::warn!(
                    file = %path.display(),
                    exposure = ?other,
                    "Dark has no usable exposure time, skipping"
                );
                continue;
            }
        };
        if let Some(bias) = &bias {
            if let Err(err) = frame.subtract(bias) {
                tracing::warn!(file = %path.display(), error = %err, "Cannot subtract master bias, skipping");
                continue;
            }
        }
        frame.scale((1.0 / exposure) as f32);
        scaled.push(frame);
    }

    let combine_method = match method {
        DarkMethod::ScaledExposureMedian => CombineMethod::Median,
        DarkMethod::ScaledExposureAverage => CombineMethod::Average,
    };
    tracing::info!(frames = scaled.len(), %method, bias_subtracted = bias.is_some(), "Building master dark");
    let mut master = combine(&scaled, combine_method, label)?;

    master.header.set(&settings.labels.image_type_keyword, label.as_str());
    master.header.set(exposure_keyword, 1.0);
    master.header.set("MD_COMB", method.to_string());
    if let Some(bias_path) = &options.master_bias {
        master.header.set("MD_BIAS", file_name(bias_path));
    }

    write_master(master, settings.working_dir.join(&options.output)).map(MasterOutcome::Written)
}

/// Options for [`build_master_flats`].
#[derive(Debug, Clone, Default)]
pub struct FlatOptions {
    pub master_bias: Option<PathBuf>,
    /// One-second master dark, scaled by each flat's exposure.
    pub master_dark: Option<PathBuf>,
}

/// The two master flats written for one filter.
#[derive(Debug, Clone)]
pub struct MasterFlat {
    pub filter: String,
    pub frames: usize,
    pub raw_path: PathBuf,
    pub norm_path: PathBuf,
}

/// `masterflat_<F>.fits` and `masterflat_<F>_norm.fits` file names.
pub fn master_flat_names(filter: &str) -> (String, String) {
    (
        format!("masterflat_{}.fits", filter),
        format!("masterflat_{}_norm.fits", filter),
    )
}

/// Build one raw and one normalised master flat per filter.
///
/// Both are written to `working_dir` and copied to `results_aux_dir`.
/// Filters are processed in name order.
pub fn build_master_flats<P: AsRef<Path>>(
    paths: &[P],
    settings: &CalibSettings,
    options: &FlatOptions,
) -> Result<MasterOutcome<Vec<MasterFlat>>> {
    if !settings.flat_correction {
        tracing::info!("Flat correction is disabled in the configuration");
        return Ok(MasterOutcome::Disabled);
    }

    let bias = options
        .master_bias
        .as_ref()
        .map(Frame::load)
        .transpose()?;
    let dark = options
        .master_dark
        .as_ref()
        .map(Frame::load)
        .transpose()?;

    let label = &settings.labels.flat;
    let filter_keyword = &settings.labels.filter_keyword;
    let exposure_keyword = &settings.labels.exposure_keyword;

    let mut groups: BTreeMap<String, Vec<Frame>> = BTreeMap::new();
    for LoadedFrame { path, mut frame } in select_frames(paths, settings, label) {
        let filter = frame.filter(filter_keyword).unwrap_or_default();
        if !settings.is_supported_filter(&filter) {
            tracing::warn!(file = %path.display(), filter, "Unknown or unsupported filter, skipping");
            continue;
        }

        if let Some(first) = groups.get(&filter).and_then(|group| group.first()) {
            if let Err(err) = first.check_shape(&frame) {
                tracing::warn!(file = %path.display(), filter, error = %err, "Skipping flat");
                continue;
            }
        }

        if let Some(bias) = &bias {
            if let Err(err) = frame.subtract(bias) {
                tracing::warn!(file = %path.display(), error = %err, "Cannot subtract master bias, skipping");
                continue;
            }
        }
        if let Some(dark) = &dark {
            let Some(exposure) = frame.exposure_time(exposure_keyword) else {
                tracing::warn!(file = %path.display(), keyword = %exposure_keyword, "Missing exposure time, skipping");
                continue;
            };
            if let Err(err) = frame.subtract_scaled(dark, exposure as f32) {
                tracing::warn!(file = %path.display(), error = %err, "Cannot subtract master dark, skipping");
                continue;
            }
        }

        groups.entry(filter).or_default().push(frame);
    }

    if groups.is_empty() {
        return Err(Error::NoFrames {
            label: label.clone(),
        });
    }

    create_dir(&settings.working_dir)?;
    create_dir(&settings.results_aux_dir)?;

    let mut written = Vec::with_capacity(groups.len());
    for (filter, frames) in groups {
        tracing::info!(filter, frames = frames.len(), "Building master flat");

        let mut raw = combine(&frames, CombineMethod::Median, label)?;
        tag_flat(&mut raw, settings, &filter);

        let normalised: Vec<Frame> = frames
            .into_iter()
            .map(|mut frame| {
                if !frame.normalize_by_mean() {
                    tracing::warn!(filter, "Flat has zero mean, left unscaled");
                }
                frame
            })
            .collect();
        let mut norm = combine(&normalised, CombineMethod::Median, label)?;
        tag_flat(&mut norm, settings, &filter);
        norm.header.set("MF_NORM", "MEAN");

        let (raw_name, norm_name) = master_flat_names(&filter);
        let raw_path = settings.working_dir.join(&raw_name);
        let norm_path = settings.working_dir.join(&norm_name);
        raw.save(&raw_path)?;
        norm.save(&norm_path)?;

        for (src, name) in [(&raw_path, &raw_name), (&norm_path, &norm_name)] {
            let dst = settings.results_aux_dir.join(name);
            fs::copy(src, &dst).map_err(io_error(&dst))?;
        }

        tracing::info!(
            filter,
            raw = %raw_path.display(),
            norm = %norm_path.display(),
            "Master flats written"
        );
        written.push(MasterFlat {
            filter,
            frames: normalised.len(),
            raw_path,
            norm_path,
        });
    }
    Ok(MasterOutcome::Written(written))
}

fn tag_flat(master: &mut Frame, settings: &CalibSettings, filter: &str) {
    master.header.set(&settings.labels.image_type_keyword, settings.labels.flat.as_str());
    master.header.set(&settings.labels.filter_keyword, filter);
    master.header.set("MF_COMB", CombineMethod::Median.to_string());
}

fn write_master(frame: Frame, path: PathBuf) -> Result<Master> {
    frame.save(&path)?;
    tracing::info!(file = %path.display(), "Master frame written");
    Ok(Master { path, frame })
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(io_error(dir))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
