//! Single-plane CCD frame: f32 pixels plus the header cards carried between
//! calibration stages.

mod fits;
pub mod header;

use std::path::PathBuf;

use rayon::prelude::*;
use thiserror::Error;

pub use header::{Card, FrameHeader, HeaderValue};

/// Errors from frame I/O and pixel arithmetic.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open FITS file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Failed to read FITS image '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Failed to write FITS file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Failed to create directory for '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Primary HDU of '{path}' is not an image")]
    NotAnImage { path: PathBuf },

    #[error("Unsupported image shape {shape:?} in '{path}'")]
    UnsupportedShape { path: PathBuf, shape: Vec<usize> },

    #[error("Frame shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Frame dimensions {width}x{height} are not divisible by 2")]
    OddDimensions { width: usize, height: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single-plane image in row-major order. Row 0 is the first row stored in
/// the FITS file (the bottom of the displayed image).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
    pub header: FrameHeader,
}

impl Frame {
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            width,
            height,
            pixels,
            header: FrameHeader::default(),
        }
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn with_header(mut self, header: FrameHeader) -> Self {
        self.header = header;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn check_shape(&self, other: &Frame) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: other.width,
                height: other.height,
            })
        }
    }

    /// Mean of all pixels, accumulated in f64.
    pub fn mean(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.pixels.par_iter().map(|&p| p as f64).sum();
        sum / self.pixels.len() as f64
    }

    /// `self -= other`
    pub fn subtract(&mut self, other: &Frame) -> Result<()> {
        self.check_shape(other)?;
        self.pixels
            .par_iter_mut()
            .zip(other.pixels.par_iter())
            .for_each(|(p, o)| *p -= o);
        Ok(())
    }

    /// `self -= factor * other`
    pub fn subtract_scaled(&mut self, other: &Frame, factor: f32) -> Result<()> {
        self.check_shape(other)?;
        self.pixels
            .par_iter_mut()
            .zip(other.pixels.par_iter())
            .for_each(|(p, o)| *p -= factor * o);
        Ok(())
    }

    /// `self /= other`. Division by zero follows IEEE rules (inf / NaN).
    pub fn divide(&mut self, other: &Frame) -> Result<()> {
        self.check_shape(other)?;
        self.pixels
            .par_iter_mut()
            .zip(other.pixels.par_iter())
            .for_each(|(p, o)| *p /= o);
        Ok(())
    }

    pub fn scale(&mut self, factor: f32) {
        self.pixels.par_iter_mut().for_each(|p| *p *= factor);
    }

    /// Divide by the frame mean so the result averages to 1.
    /// A zero mean leaves the frame unchanged and returns `false`.
    pub fn normalize_by_mean(&mut self) -> bool {
        let mean = self.mean();
        if mean == 0.0 || !mean.is_finite() {
            return false;
        }
        self.scale((1.0 / mean) as f32);
        true
    }

    /// Mean of every 2x2 block. Requires even dimensions.
    pub fn bin_2x2(&self) -> Result<Frame> {
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(Error::OddDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let out_width = self.width / 2;
        let out_height = self.height / 2;
        let mut pixels = vec![0.0f32; out_width * out_height];

        pixels
            .par_chunks_mut(out_width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                let top = &self.pixels[2 * y * self.width..(2 * y + 1) * self.width];
                let bottom = &self.pixels[(2 * y + 1) * self.width..(2 * y + 2) * self.width];
                for (x, out) in row.iter_mut().enumerate() {
                    let sum = top[2 * x] + top[2 * x + 1] + bottom[2 * x] + bottom[2 * x + 1];
                    *out = sum * 0.25;
                }
            });

        Ok(Frame::new(out_width, out_height, pixels).with_header(self.header.clone()))
    }

    /// Trimmed, upper-cased text of a header keyword.
    pub fn keyword_upper(&self, keyword: &str) -> Option<String> {
        self.header.get_text(keyword).map(|s| s.to_uppercase())
    }

    /// Image type (e.g. `BIAS`, `OBJECT`) from the given keyword, upper-cased.
    pub fn image_type(&self, keyword: &str) -> Option<String> {
        self.keyword_upper(keyword)
    }

    /// Exposure time in seconds from the given keyword.
    pub fn exposure_time(&self, keyword: &str) -> Option<f64> {
        self.header.get_f64(keyword)
    }

    /// Filter name from the given keyword, trimmed but case preserved.
    pub fn filter(&self, keyword: &str) -> Option<String> {
        self.header.get_text(keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Frame {
        let pixels = (0..width * height).map(|i| i as f32).collect();
        Frame::new(width, height, pixels)
    }

    #[test]
    #[should_panic(expected = "pixels length")]
    fn test_new_rejects_wrong_length() {
        Frame::new(3, 3, vec![0.0; 8]);
    }

    #[test]
    fn test_subtract() {
        let mut light = Frame::filled(4, 3, 10.0);
        let bias = Frame::filled(4, 3, 2.5);
        light.subtract(&bias).unwrap();
        assert!(light.pixels().iter().all(|&p| p == 7.5));
    }

    #[test]
    fn test_subtract_scaled() {
        let mut light = Frame::filled(2, 2, 100.0);
        let dark = Frame::new(2, 2, vec![0.5, 1.0, 1.5, 2.0]);
        light.subtract_scaled(&dark, 10.0).unwrap();
        // 100 - 10 * [0.5, 1.0, 1.5, 2.0]
        assert_eq!(light.pixels(), &[95.0, 90.0, 85.0, 80.0]);
    }

    #[test]
    fn test_divide() {
        let mut light = Frame::new(2, 1, vec![10.0, 9.0]);
        let flat = Frame::new(2, 1, vec![0.5, 1.5]);
        light.divide(&flat).unwrap();
        assert_eq!(light.pixels(), &[20.0, 6.0]);
    }

    #[test]
    fn test_divide_by_zero_is_ieee() {
        let mut light = Frame::new(2, 1, vec![1.0, 0.0]);
        let flat = Frame::filled(2, 1, 0.0);
        light.divide(&flat).unwrap();
        assert!(light.pixels()[0].is_infinite());
        assert!(light.pixels()[1].is_nan());
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let mut a = Frame::filled(4, 4, 1.0);
        let b = Frame::filled(4, 5, 1.0);
        let err = a.subtract(&b).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { height: 5, .. }));
        assert!(err.to_string().contains("4x4"));
        assert!(a.divide(&b).is_err());
        assert!(a.subtract_scaled(&b, 1.0).is_err());
        // untouched on error
        assert!(a.pixels().iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_mean_and_normalize() {
        let mut frame = Frame::new(2, 2, vec![1.0, 2.0, 3.0, 6.0]);
        assert!((frame.mean() - 3.0).abs() < 1e-12);
        assert!(frame.normalize_by_mean());
        assert!((frame.mean() - 1.0).abs() < 1e-6);
        assert!((frame.pixels()[3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_mean_unchanged() {
        let mut frame = Frame::new(2, 1, vec![-1.0, 1.0]);
        assert!(!frame.normalize_by_mean());
        assert_eq!(frame.pixels(), &[-1.0, 1.0]);
    }

    #[test]
    fn test_bin_2x2() {
        // 4x2 ramp:
        // 0 1 2 3
        // 4 5 6 7
        let mut frame = ramp(4, 2);
        frame.header.set("FILTER", "V");
        let binned = frame.bin_2x2().unwrap();
        assert_eq!(binned.width(), 2);
        assert_eq!(binned.height(), 1);
        // (0+1+4+5)/4 = 2.5, (2+3+6+7)/4 = 4.5
        assert_eq!(binned.pixels(), &[2.5, 4.5]);
        assert_eq!(binned.header.get_text("FILTER").as_deref(), Some("V"));
    }

    #[test]
    fn test_bin_2x2_odd_dimensions() {
        let frame = ramp(3, 2);
        assert!(matches!(
            frame.bin_2x2(),
            Err(Error::OddDimensions { width: 3, height: 2 })
        ));
    }

    #[test]
    fn test_header_helpers() {
        let mut frame = Frame::filled(1, 1, 0.0);
        frame.header.set("IMAGETYP", " Bias ");
        frame.header.set("EXPTIME", 12i64);
        frame.header.set("FILTER", "Haw");
        assert_eq!(frame.image_type("IMAGETYP").as_deref(), Some("BIAS"));
        assert_eq!(frame.exposure_time("EXPTIME"), Some(12.0));
        assert_eq!(frame.filter("FILTER").as_deref(), Some("Haw"));
        assert_eq!(frame.exposure_time("EXPOSURE"), None);
    }
}
