//! CCD calibration: master bias/dark/flat construction and frame correction.
//!
//! Every tool in `src/bin/` is a thin wrapper over one of the batch
//! operations exported here.

pub mod archive;
pub mod binning;
pub mod cli;
pub mod combine;
pub mod config;
pub mod correction;
pub mod file_list;
pub mod flat_normalisation;
pub mod frame;
pub mod masters;
pub mod preview;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_utils;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use combine::{combine, CombineMethod};
pub use config::{CalibConfig, CalibSettings, ConfigError, FrameLabels};
pub use frame::{Frame, FrameHeader, HeaderValue};

/// Errors from the calibration operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No {label} frames to combine")]
    NoFrames { label: String },

    #[error("Unsupported {kind} combination method '{method}'")]
    UnsupportedMethod { kind: &'static str, method: String },

    #[error("Sigma must be positive, got {0}")]
    InvalidSigma(f64),

    #[error("Missing '{keyword}' keyword in '{path}'")]
    MissingKeyword { path: PathBuf, keyword: String },

    #[error("Master flat for filter '{filter}' not found at '{path}'")]
    MissingMasterFlat { filter: String, path: PathBuf },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported archive format: '{path}'")]
    UnsupportedArchive { path: PathBuf },

    #[error("Failed to read archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to write preview '{path}': {source}")]
    Preview {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Frame(#[from] frame::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frames_error_message() {
        let err = Error::NoFrames {
            label: "BIAS".to_string(),
        };
        assert_eq!(err.to_string(), "No BIAS frames to combine");
    }

    #[test]
    fn test_frame_error_is_transparent() {
        let err: Error = frame::Error::OddDimensions {
            width: 3,
            height: 4,
        }
        .into();
        assert_eq!(err.to_string(), "Frame dimensions 3x4 are not divisible by 2");
    }
}
