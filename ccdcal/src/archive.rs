//! Zip and tar archives of raw frames, unpacked before the lists are built.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::{io_error, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    /// Kind from the file name: `.zip`, `.tar`, `.tar.gz` or `.tgz`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

/// Base name for lists built from an archive: `night1.tar.gz` → `night1`.
pub fn archive_base_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let base = stem.strip_suffix(".tar").unwrap_or(&stem);
    (!base.is_empty()).then(|| base.to_string())
}

/// Unpack `archive` into `dest`.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let kind = ArchiveKind::from_path(archive).ok_or_else(|| Error::UnsupportedArchive {
        path: archive.to_path_buf(),
    })?;
    let file = File::open(archive).map_err(io_error(archive))?;
    match kind {
        ArchiveKind::Zip => zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(dest))
            .map_err(|source| Error::Archive {
                path: archive.to_path_buf(),
                source,
            })?,
        ArchiveKind::Tar => unpack_tar(file, archive, dest)?,
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(file), archive, dest)?,
    }
    tracing::debug!(archive = %archive.display(), ?kind, dest = %dest.display(), "Extracted archive");
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(io_error(archive))
}

/// FITS files below `dir`, as paths relative to it, sorted.
pub fn fits_members(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = common::file_utils::fits_files_recursive(dir).map_err(io_error(dir))?;
    Ok(files
        .into_iter()
        .filter_map(|path| path.strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect())
}

/// Unpack `archive` into `dest` and list the FITS files it contained.
pub fn extract_fits(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    extract(archive, dest)?;
    let members = fits_members(dest)?;
    tracing::info!(archive = %archive.display(), frames = members.len(), "Read archive");
    Ok(members)
}
