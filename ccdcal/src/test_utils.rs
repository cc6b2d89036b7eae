//! Synthetic frames for unit tests.

use std::path::{Path, PathBuf};

use crate::correction::{Stage, Stages};
use crate::frame::Frame;

/// A constant frame tagged with an image type and optional exposure/filter.
pub fn tagged_frame(
    width: usize,
    height: usize,
    value: f32,
    image_type: &str,
    exposure: Option<f64>,
    filter: Option<&str>,
) -> Frame {
    let mut frame = Frame::filled(width, height, value);
    frame.header.set("IMAGETYP", image_type);
    if let Some(exposure) = exposure {
        frame.header.set("EXPTIME", exposure);
    }
    if let Some(filter) = filter {
        frame.header.set("FILTER", filter);
    }
    frame
}

/// Save `frame` as `dir/name` and return the path.
pub fn write_frame(dir: &Path, name: &str, frame: &Frame) -> PathBuf {
    let path = dir.join(name);
    frame.save(&path).unwrap();
    path
}

/// Mark `frame` as having gone through the stages named by `letters`
/// (`"b"`, `"bd"`, ...), as the correction tools do.
pub fn corrected(mut frame: Frame, letters: &str) -> Frame {
    let stages = Stages::parse(letters).unwrap();
    for stage in Stage::ALL.into_iter().filter(|s| stages.contains(*s)) {
        frame.header.set(stage.header_keyword(), "master.fits");
    }
    frame
}
