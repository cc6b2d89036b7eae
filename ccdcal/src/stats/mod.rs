//! Robust statistics used when combining calibration frames.


/// Iteration cap for sigma clipping when none is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Median of `values`, averaging the middle pair for even lengths.
///
/// Reorders the buffer (quickselect). NaN values sort last.
/// Returns NaN for an empty slice.
pub fn median_mut(values: &mut [f32]) -> f32 {
    let len = values.len();
    if len == 0 {
        return f32::NAN;
    }
    let mid = len / 2;
    let (left, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if len % 2 == 1 {
        return upper;
    }
    let lower = left.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (lower + upper) * 0.5
}

/// Median of a borrowed slice. Copies into a scratch buffer.
pub fn median(values: &[f32]) -> f32 {
    let mut scratch = values.to_vec();
    median_mut(&mut scratch)
}

/// Arithmetic mean accumulated in f64. NaN for an empty slice.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    (sum / values.len() as f64) as f32
}

/// Population standard deviation (ddof = 0) around `mean`.
pub fn std_dev(values: &[f32], mean: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean as f64;
    let sum_sq: f64 = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum();
    (sum_sq / values.len() as f64).sqrt() as f32
}

/// Sigma-clipping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClip {
    /// Rejection threshold in standard deviations.
    pub sigma: f32,
    pub max_iterations: usize,
}

impl SigmaClip {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for SigmaClip {
    fn default() -> Self {
        Self::new(3.0)
    }
}

/// Iterative sigma clipping around the median.
///
/// Each pass computes the median and population std of the surviving values
/// and keeps those with `|v - median| <= sigma * std`. Stops when nothing is
/// rejected, when std is zero, or after `max_iterations` passes. A pass that
/// would reject everything is discarded.
///
/// `values` is compacted in place; returns the number of survivors, which are
/// `values[..n]`.
pub fn sigma_clip_mut(values: &mut [f32], clip: SigmaClip) -> usize {
    let mut len = values.len();
    for _ in 0..clip.max_iterations {
        if len < 2 {
            break;
        }
        let active = &mut values[..len];
        let center = median_mut(active);
        let std = std_dev(active, mean(active));
        if std <= 0.0 || !std.is_finite() {
            break;
        }
        let threshold = clip.sigma * std;

        let mut kept = 0;
        for i in 0..len {
            let v = values[i];
            if (v - center).abs() <= threshold {
                values[kept] = v;
                kept += 1;
            }
        }
        if kept == len || kept == 0 {
            break;
        }
        len = kept;
    }
    len
}

/// Sigma clipping on a borrowed slice, returning the survivors.
pub fn sigma_clip(values: &[f32], clip: SigmaClip) -> Vec<f32> {
    let mut scratch = values.to_vec();
    let n = sigma_clip_mut(&mut scratch, clip);
    scratch.truncate(n);
    scratch
}

/// Median of the sigma-clip survivors.
pub fn sigma_clipped_median_mut(values: &mut [f32], clip: SigmaClip) -> f32 {
    let n = sigma_clip_mut(values, clip);
    median_mut(&mut values[..n])
}
