//! Per-pixel combination of equally sized frames.

use rayon::prelude::*;
use strum_macros::Display;

use crate::frame::Frame;
use crate::stats::{self, SigmaClip};
use crate::{Error, Result};

/// How the values of one pixel across a stack are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum CombineMethod {
    Median,
    Average,
    /// Median of the values surviving iterative sigma clipping.
    #[strum(to_string = "MedianSigmaClipped")]
    MedianSigmaClipped { sigma: f32 },
}

impl CombineMethod {
    fn reduce(self, values: &mut [f32]) -> f32 {
        match self {
            CombineMethod::Median => stats::median_mut(values),
            CombineMethod::Average => stats::mean(values),
            CombineMethod::MedianSigmaClipped { sigma } => {
                stats::sigma_clipped_median_mut(values, SigmaClip::new(sigma))
            }
        }
    }
}

/// Combine `frames` pixel by pixel.
///
/// All frames must share one shape. The result carries the first frame's
/// header plus `NCOMBINE`. `label` names the frame kind in errors and logs.
pub fn combine(frames: &[Frame], method: CombineMethod, label: &str) -> Result<Frame> {
    let Some(first) = frames.first() else {
        return Err(Error::NoFrames {
            label: label.to_string(),
        });
    };
    for frame in &frames[1..] {
        first.check_shape(frame)?;
    }

    let width = first.width();
    let height = first.height();
    let count = frames.len();
    tracing::debug!(
        label,
        %method,
        frames = count,
        width,
        height,
        "Combining frames"
    );

    let mut pixels = vec![0.0f32; width * height];
    pixels
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let mut values = vec![0.0f32; count];
            let offset = y * width;
            for (x, out) in row.iter_mut().enumerate() {
                for (slot, frame) in values.iter_mut().zip(frames) {
                    *slot = frame.pixels()[offset + x];
                }
                *out = method.reduce(&mut values);
            }
        });

    let mut header = first.header.clone();
    header.set("NCOMBINE", count);
    Ok(Frame::new(width, height, pixels).with_header(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;

    fn frames_from(values: &[f32]) -> Vec<Frame> {
        values.iter().map(|&v| Frame::filled(3, 2, v)).collect()
    }

    #[test]
    fn test_median() {
        let frames = frames_from(&[1.0, 5.0, 2.0]);
        let result = combine(&frames, CombineMethod::Median, "BIAS").unwrap();
        assert!(result.pixels().iter().all(|&p| p == 2.0));
        assert_eq!(result.width(), 3);
        assert_eq!(result.height(), 2);
    }

    #[test]
    fn test_average() {
        let frames = frames_from(&[1.0, 2.0, 6.0]);
        let result = combine(&frames, CombineMethod::Average, "DARK").unwrap();
        assert!(result.pixels().iter().all(|&p| (p - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_sigma_clipped_rejects_cosmic_ray() {
        let mut frames = frames_from(&[10.0, 11.0, 9.0, 10.0, 10.5, 9.5, 10.0]);
        // a hit on one pixel of one frame
        frames[2].pixels_mut()[4] = 5000.0;
        let method = CombineMethod::MedianSigmaClipped { sigma: 2.0 };
        let result = combine(&frames, method, "BIAS").unwrap();
        assert!((result.get(1, 1) - 10.0).abs() < 1e-6);
        assert!((result.get(0, 0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixels_combined_independently() {
        let a = Frame::new(2, 1, vec![1.0, 10.0]);
        let b = Frame::new(2, 1, vec![3.0, 20.0]);
        let result = combine(&[a, b], CombineMethod::Average, "FLAT").unwrap();
        assert_eq!(result.pixels(), &[2.0, 15.0]);
    }

    #[test]
    fn test_header_from_first_frame_with_ncombine() {
        let mut frames = frames_from(&[1.0, 2.0]);
        frames[0].header.set("FILTER", "V");
        frames[1].header.set("FILTER", "R");
        let result = combine(&frames, CombineMethod::Median, "FLAT").unwrap();
        assert_eq!(result.header.get_text("FILTER").as_deref(), Some("V"));
        assert_eq!(result.header.get_f64("NCOMBINE"), Some(2.0));
    }

    #[test]
    fn test_no_frames() {
        let err = combine(&[], CombineMethod::Median, "BIAS").unwrap_err();
        assert!(matches!(err, Error::NoFrames { ref label } if label == "BIAS"));
    }

    #[test]
    fn test_shape_mismatch() {
        let frames = vec![Frame::filled(3, 2, 1.0), Frame::filled(2, 3, 1.0)];
        let err = combine(&frames, CombineMethod::Median, "BIAS").unwrap_err();
        assert!(matches!(err, Error::Frame(frame::Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(CombineMethod::Median.to_string(), "Median");
        assert_eq!(
            CombineMethod::MedianSigmaClipped { sigma: 3.0 }.to_string(),
            "MedianSigmaClipped"
        );
    }
}
