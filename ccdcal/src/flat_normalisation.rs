//! Ratios of consecutive mean-normalised flats, for checking flat stability.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CalibSettings;
use crate::frame::Frame;
use crate::{file_list, io_error, Result};

/// Broadband filters compared by this diagnostic.
pub const RATIO_FILTERS: [&str; 5] = ["U", "B", "V", "R", "I"];

pub const OUTPUT_DIR: &str = "normalised_flats";
pub const OUTPUT_LIST: &str = "normalised_fits_list.txt";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalisationReport {
    /// Ratio frames in the order they were written.
    pub outputs: Vec<PathBuf>,
    /// List of all outputs, written when at least one ratio was produced.
    pub list: Option<PathBuf>,
}

/// For every filter with two or more flats, write
/// `normalised_flats/flat_norm_<F>_<i>.fits = norm[i] / norm[i-1]` next to
/// the first flat of that filter. Each flat is divided by its own mean first.
///
/// The combined list goes into the output directory of the first filter
/// processed. Filters are processed in name order.
pub fn normalise_flats<P: AsRef<Path>>(
    paths: &[P],
    settings: &CalibSettings,
) -> Result<NormalisationReport> {
    let filter_keyword = &settings.labels.filter_keyword;
    let mut groups: BTreeMap<String, Vec<(PathBuf, Frame)>> = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        let frame = Frame::load(path)?;
        let filter = frame
            .filter(filter_keyword)
            .map(|f| f.to_uppercase())
            .unwrap_or_default();
        if !RATIO_FILTERS.contains(&filter.as_str()) {
            tracing::warn!(file = %path.display(), filter, "Unknown or unsupported filter, skipping");
            continue;
        }
        if let Some((_, first)) = groups.get(&filter).and_then(|g| g.first()) {
            if let Err(err) = first.check_shape(&frame) {
                tracing::warn!(file = %path.display(), filter, error = %err, "Skipping flat");
                continue;
            }
        }
        groups.entry(filter).or_default().push((path.to_path_buf(), frame));
    }

    let mut report = NormalisationReport::default();
    let mut list_dir: Option<PathBuf> = None;

    for (filter, flats) in groups {
        if flats.len() < 2 {
            tracing::warn!(filter, flats = flats.len(), "Not enough flats, skipping filter");
            continue;
        }
        let base_dir = flats[0].0.parent().unwrap_or_else(|| Path::new("."));
        let output_dir = base_dir.join(OUTPUT_DIR);
        fs::create_dir_all(&output_dir).map_err(io_error(&output_dir))?;

        let normalised: Vec<Frame> = flats
            .into_iter()
            .map(|(path, mut frame)| {
                if !frame.normalize_by_mean() {
                    tracing::warn!(file = %path.display(), "Flat has zero mean, left unscaled");
                }
                frame
            })
            .collect();

        for (i, pair) in normalised.windows(2).enumerate() {
            let mut ratio = pair[1].clone();
            ratio.divide(&pair[0])?;
            let output = output_dir.join(format!("flat_norm_{}_{}.fits", filter, i + 1));
            ratio.save(&output)?;
            tracing::info!(file = %output.display(), "Written");
            report.outputs.push(output);
        }
        list_dir.get_or_insert(output_dir);
    }

    match list_dir {
        Some(dir) if !report.outputs.is_empty() => {
            let list = dir.join(OUTPUT_LIST);
            file_list::write_list(&list, &report.outputs)?;
            tracing::info!(file = %list.display(), "Combined normalised list written");
            report.list = Some(list);
        }
        _ => tracing::warn!("No valid normalised flats created"),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::test_utils::{tagged_frame, write_frame};

    #[test]
    fn test_ratios_per_filter() {
        let dir = TempDir::new().unwrap();
        let settings = CalibSettings::default();
        let mut v2 = tagged_frame(2, 1, 0.0, "FLAT", None, Some("v"));
        v2.pixels_mut().copy_from_slice(&[10.0, 30.0]);
        let paths = vec![
            write_frame(dir.path(), "v1.fits", &tagged_frame(2, 1, 5.0, "FLAT", None, Some("V"))),
            write_frame(dir.path(), "v2.fits", &v2),
            write_frame(dir.path(), "v3.fits", &tagged_frame(2, 1, 8.0, "FLAT", None, Some("V"))),
            // single flat: skipped
            write_frame(dir.path(), "b1.fits", &tagged_frame(2, 1, 5.0, "FLAT", None, Some("B"))),
            // not a broadband filter
            write_frame(dir.path(), "h1.fits", &tagged_frame(2, 1, 5.0, "FLAT", None, Some("Haw"))),
            write_frame(dir.path(), "h2.fits", &tagged_frame(2, 1, 5.0, "FLAT", None, Some("Haw"))),
        ];

        let report = normalise_flats(&paths, &settings).unwrap();
        let out_dir = dir.path().join(OUTPUT_DIR);
        assert_eq!(
            report.outputs,
            vec![out_dir.join("flat_norm_V_1.fits"), out_dir.join("flat_norm_V_2.fits")]
        );
        assert_eq!(report.list, Some(out_dir.join(OUTPUT_LIST)));

        // norm: [1, 1], [0.5, 1.5], [1, 1]
        let first = Frame::load(&report.outputs[0]).unwrap();
        assert_eq!(first.pixels(), &[0.5, 1.5]);
        let second = Frame::load(&report.outputs[1]).unwrap();
        assert!((second.pixels()[0] - 2.0).abs() < 1e-6);
        assert!((second.pixels()[1] - 1.0 / 1.5).abs() < 1e-6);

        let listed = file_list::read_list(&out_dir.join(OUTPUT_LIST)).unwrap();
        assert_eq!(listed, report.outputs);
    }

    #[test]
    fn test_nothing_to_compare() {
        let dir = TempDir::new().unwrap();
        let paths = vec![write_frame(
            dir.path(),
            "r1.fits",
            &tagged_frame(2, 1, 5.0, "FLAT", None, Some("R")),
        )];
        let report = normalise_flats(&paths, &CalibSettings::default()).unwrap();
        assert!(report.outputs.is_empty());
        assert!(report.list.is_none());
        assert!(!dir.path().join(OUTPUT_DIR).exists());
    }
}
