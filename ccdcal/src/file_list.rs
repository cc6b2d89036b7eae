//! Plain-text file lists that chain the tools together.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{io_error, Result};

/// Suffixes of the per-stage lists prepared before a calibration run.
pub const STAGE_SUFFIXES: [&str; 7] = ["", "-b", "-d", "-bd", "-bf", "-df", "-bdf"];

/// Extensions of arguments that are read as lists rather than frames.
pub const LIST_EXTENSIONS: [&str; 2] = ["lst", "txt"];

/// Read a list file: one path per line, trimmed, blank lines skipped.
pub fn read_list(path: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Write one path per line, each terminated by a newline.
pub fn write_list<P: AsRef<Path>>(path: &Path, items: &[P]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut file = fs::File::create(path).map_err(io_error(path))?;
    for item in items {
        writeln!(file, "{}", item.as_ref().display()).map_err(io_error(path))?;
    }
    tracing::debug!(file = %path.display(), entries = items.len(), "Wrote file list");
    Ok(())
}

/// Expand command-line inputs: `.lst`/`.txt` arguments are read as lists,
/// anything else is taken as a frame path.
pub fn expand_inputs<P: AsRef<Path>>(args: &[P]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if common::file_utils::has_extension(arg, &LIST_EXTENSIONS) {
            paths.extend(read_list(arg)?);
        } else {
            paths.push(arg.to_path_buf());
        }
    }
    Ok(paths)
}

/// FITS files in `dir`, sorted by name.
pub fn fits_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    common::file_utils::fits_files(dir).map_err(io_error(dir))
}

/// File name of `path` with `suffix` inserted before the extension.
pub fn with_stage_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{}{}", stem, suffix);
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// One list per stage suffix: `<base><suffix>.lst` with every original path
/// renamed to carry the suffix.
pub fn derived_lists(base: &str, originals: &[PathBuf]) -> Vec<(String, Vec<PathBuf>)> {
    STAGE_SUFFIXES
        .iter()
        .map(|suffix| {
            let entries = originals
                .iter()
                .map(|path| with_stage_suffix(path, suffix))
                .collect();
            (format!("{}{}.lst", base, suffix), entries)
        })
        .collect()
}

/// Write the lists from [`derived_lists`] into `out_dir`. Returns the paths
/// written.
///
/// An existing `<base>.lst` is left alone: it is usually the list the frames
/// came from.
pub fn write_derived_lists(out_dir: &Path, base: &str, originals: &[PathBuf]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;
    let mut written = Vec::with_capacity(STAGE_SUFFIXES.len());
    for ((name, entries), suffix) in derived_lists(base, originals).into_iter().zip(STAGE_SUFFIXES) {
        let path = out_dir.join(name);
        if suffix.is_empty() && path.exists() {
            tracing::info!(file = %path.display(), "Base list exists, keeping it");
            continue;
        }
        write_list(&path, &entries)?;
        written.push(path);
    }
    tracing::info!(dir = %out_dir.display(), lists = written.len(), frames = originals.len(), "Prepared stage lists");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_read_list_trims_and_skips_blank() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("in.lst");
        fs::write(&list, "  a.fits \n\n/data/b.fits\n   \n").unwrap();
        assert_eq!(
            read_list(&list).unwrap(),
            vec![PathBuf::from("a.fits"), PathBuf::from("/data/b.fits")]
        );
    }

    #[test]
    fn test_read_missing_list() {
        let err = read_list(Path::new("/nonexistent/in.lst")).unwrap_err();
        assert!(matches!(err, crate::Error::Io { .. }));
    }

    #[test]
    fn test_write_list_creates_parent() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("lists/out.lst");
        write_list(&list, &["x.fits", "y.fits"]).unwrap();
        assert_eq!(fs::read_to_string(&list).unwrap(), "x.fits\ny.fits\n");

        write_list::<&str>(&list, &[]).unwrap();
        assert_eq!(fs::read_to_string(&list).unwrap(), "");
    }

    #[test]
    fn test_expand_inputs() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("flats.txt");
        fs::write(&list, "f1.fits\nf2.fits\n").unwrap();
        let args = vec![PathBuf::from("f0.fits"), list];
        assert_eq!(
            expand_inputs(&args).unwrap(),
            vec![
                PathBuf::from("f0.fits"),
                PathBuf::from("f1.fits"),
                PathBuf::from("f2.fits")
            ]
        );
    }

    #[test]
    fn test_fits_files_in_dir() {
        let dir = TempDir::new().unwrap();
        for name in ["b.fits", "a.FIT", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = fits_files_in_dir(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.FIT"), dir.path().join("b.fits")]);
    }

    #[test]
    fn test_with_stage_suffix() {
        assert_eq!(
            with_stage_suffix(Path::new("/d/m31_001.fits"), "-bd"),
            PathBuf::from("/d/m31_001-bd.fits")
        );
        // names are never stripped, even when they end like a stage suffix
        assert_eq!(
            with_stage_suffix(Path::new("/d/m31-b.fits"), "-b"),
            PathBuf::from("/d/m31-b-b.fits")
        );
        assert_eq!(
            with_stage_suffix(Path::new("m31-b.fit"), ""),
            PathBuf::from("m31-b.fit")
        );
    }

    #[test]
    fn test_derived_lists() {
        let originals = vec![PathBuf::from("/n/a.fits"), PathBuf::from("/n/b.fits")];
        let lists = derived_lists("night1", &originals);
        let names: Vec<&str> = lists.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "night1.lst",
                "night1-b.lst",
                "night1-d.lst",
                "night1-bd.lst",
                "night1-bf.lst",
                "night1-df.lst",
                "night1-bdf.lst"
            ]
        );
        assert_eq!(lists[0].1, originals);
        assert_eq!(
            lists[3].1,
            vec![PathBuf::from("/n/a-bd.fits"), PathBuf::from("/n/b-bd.fits")]
        );
    }

    #[test]
    fn test_write_derived_lists() {
        let dir = TempDir::new().unwrap();
        let originals = vec![PathBuf::from("/n/a.fits")];
        let written = write_derived_lists(&dir.path().join("lists"), "fits_list", &originals).unwrap();
        assert_eq!(written.len(), 7);
        let bdf = fs::read_to_string(dir.path().join("lists/fits_list-bdf.lst")).unwrap();
        assert_eq!(bdf, "/n/a-bdf.fits\n");
    }

    #[test]
    fn test_write_derived_lists_keeps_existing_base_list() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("night.lst");
        fs::write(&list, "raw/a.fits\n\nraw/b.fits\n").unwrap();
        let originals = read_list(&list).unwrap();

        let written = write_derived_lists(dir.path(), "night", &originals).unwrap();
        assert_eq!(written.len(), 6);
        assert!(!written.contains(&list));
        assert_eq!(fs::read_to_string(&list).unwrap(), "raw/a.fits\n\nraw/b.fits\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("night-b.lst")).unwrap(),
            "raw/a-b.fits\nraw/b-b.fits\n"
        );
    }
}
