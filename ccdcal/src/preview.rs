//! Grey-scale PNG quick-looks of frames, stretched with the IRAF zscale interval.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

use crate::frame::Frame;
use crate::{stats, Error, Result};

/// Parameters of the zscale interval, with the IRAF defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScale {
    /// Maximum number of pixels sampled from the frame.
    pub samples: usize,
    /// Slope divisor; smaller values widen the interval.
    pub contrast: f32,
    /// Fraction of samples that may be rejected before falling back to min/max.
    pub max_reject: f32,
    pub min_pixels: usize,
    /// Rejection threshold in standard deviations of the fit residuals.
    pub krej: f32,
    pub max_iterations: usize,
}

impl Default for ZScale {
    fn default() -> Self {
        Self {
            samples: 1000,
            contrast: 0.25,
            max_reject: 0.5,
            min_pixels: 5,
            krej: 2.5,
            max_iterations: 5,
        }
    }
}

impl ZScale {
    /// Display limits `(vmin, vmax)` for `pixels`. Non-finite pixels are ignored.
    /// Returns `None` when no finite pixel is sampled.
    pub fn limits(&self, pixels: &[f32]) -> Option<(f32, f32)> {
        let stride = (pixels.len() / self.samples.max(1)).max(1);
        let mut samples: Vec<f32> = pixels
            .iter()
            .step_by(stride)
            .take(self.samples)
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(f32::total_cmp);

        let npix = samples.len();
        let mut vmin = samples[0];
        let mut vmax = samples[npix - 1];

        let min_good = self.min_pixels.max((npix as f32 * self.max_reject) as usize);
        let grow = ((npix as f32 * 0.01) as usize).max(1);
        let mut bad = vec![false; npix];
        let mut good = npix;
        let mut last_good = npix + 1;
        let mut slope = 0.0f64;

        for _ in 0..self.max_iterations {
            if good >= last_good || good < min_good {
                break;
            }
            let Some((fit_slope, intercept)) = fit_line(&samples, &bad) else {
                break;
            };
            slope = fit_slope;

            let residuals: Vec<f64> = samples
                .iter()
                .enumerate()
                .map(|(i, &v)| v as f64 - (intercept + fit_slope * i as f64))
                .collect();
            let kept: Vec<f32> = residuals
                .iter()
                .zip(&bad)
                .filter(|&(_, &b)| !b)
                .map(|(&r, _)| r as f32)
                .collect();
            let threshold = self.krej as f64 * stats::std_dev(&kept, stats::mean(&kept)) as f64;
            for (flag, r) in bad.iter_mut().zip(&residuals) {
                if r.abs() > threshold {
                    *flag = true;
                }
            }
            bad = grow_mask(&bad, grow);

            last_good = good;
            good = bad.iter().filter(|&&b| !b).count();
        }

        if good >= min_good {
            if self.contrast > 0.0 {
                slope /= self.contrast as f64;
            }
            let center = (npix as i64 - 1) / 2;
            let median = stats::median_mut(&mut samples) as f64;
            vmin = vmin.max((median - (center - 1) as f64 * slope) as f32);
            vmax = vmax.min((median + (npix as i64 - center) as f64 * slope) as f32);
        }
        Some((vmin, vmax))
    }
}

/// Least-squares line through the unmasked samples, `y = intercept + slope * index`.
fn fit_line(samples: &[f32], bad: &[bool]) -> Option<(f64, f64)> {
    let (mut n, mut sx, mut sy, mut sxx, mut sxy) = (0.0f64, 0.0, 0.0, 0.0, 0.0);
    for (i, (&y, &b)) in samples.iter().zip(bad).enumerate() {
        if b {
            continue;
        }
        let x = i as f64;
        let y = y as f64;
        n += 1.0;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let denom = n * sxx - sx * sx;
    if n < 2.0 || denom == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    Some((slope, (sy - slope * sx) / n))
}

/// Dilate the rejection mask by a window of `width` samples.
fn grow_mask(bad: &[bool], width: usize) -> Vec<bool> {
    let before = width / 2;
    let after = (width - 1) / 2;
    (0..bad.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(bad.len());
            bad[start..end].iter().any(|&b| b)
        })
        .collect()
}

/// PNG path written beside a FITS file.
pub fn preview_path(fits_path: &Path) -> PathBuf {
    fits_path.with_extension("png")
}

/// Map `frame` to 8-bit grey through the zscale interval. The first FITS row
/// ends up at the bottom of the image.
pub fn to_gray_image(frame: &Frame) -> GrayImage {
    let (lo, hi) = ZScale::default()
        .limits(frame.pixels())
        .unwrap_or((0.0, 0.0));
    let range = hi - lo;
    let height = frame.height();

    GrayImage::from_fn(frame.width() as u32, height as u32, |x, y| {
        let v = frame.get(x as usize, height - 1 - y as usize);
        let level = if range > 0.0 && v.is_finite() {
            ((v - lo) / range * 255.0).round().clamp(0.0, 255.0) as u8
        } else {
            0
        };
        Luma([level])
    })
}

/// Write a zscale PNG of `frame` to `path`.
pub fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    to_gray_image(frame)
        .save(path)
        .map_err(|source| Error::Preview {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(file = %path.display(), "Created PNG preview");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_limits_of_linear_ramp() {
        // a perfect ramp fits exactly; contrast widens past the data range
        let pixels: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let (lo, hi) = ZScale::default().limits(&pixels).unwrap();
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 99.0);
    }

    #[test]
    fn test_limits_tighter_than_outliers() {
        let mut pixels: Vec<f32> = (0..500).map(|i| 100.0 + (i % 7) as f32).collect();
        pixels[10] = 65000.0;
        pixels[20] = -5000.0;
        let (lo, hi) = ZScale::default().limits(&pixels).unwrap();
        assert!(lo > -5000.0, "lo = {}", lo);
        assert!(hi < 65000.0, "hi = {}", hi);
        assert!(lo <= 103.0 && hi >= 103.0);
    }

    #[test]
    fn test_limits_ignore_non_finite() {
        let pixels = [f32::NAN, 1.0, f32::INFINITY, 2.0, 3.0];
        let (lo, hi) = ZScale::default().limits(&pixels).unwrap();
        assert!(lo.is_finite() && hi.is_finite());
        assert!(ZScale::default().limits(&[f32::NAN]).is_none());
    }

    #[test]
    fn test_limits_constant_frame() {
        let (lo, hi) = ZScale::default().limits(&[7.0; 64]).unwrap();
        assert_eq!((lo, hi), (7.0, 7.0));
    }

    #[test]
    fn test_grow_mask() {
        let bad = [false, false, true, false, false];
        assert_eq!(grow_mask(&bad, 1), bad.to_vec());
        assert_eq!(grow_mask(&bad, 3), vec![false, true, true, true, false]);
    }

    #[test]
    fn test_gray_image_origin_lower() {
        // row 0 (first in file) dark, row 1 bright
        let frame = Frame::new(2, 2, vec![0.0, 0.0, 100.0, 100.0]);
        let img = to_gray_image(&frame);
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0[0], 255);
        assert_eq!(img.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_write_png() {
        let dir = TempDir::new().unwrap();
        let fits = dir.path().join("masterbias.fits");
        let png = preview_path(&fits);
        assert_eq!(png, dir.path().join("masterbias.png"));

        let frame = Frame::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        write_png(&frame, &png).unwrap();
        let img = image::open(&png).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (3, 2));
    }
}
