use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;

use fitsio::errors::check_status;
use fitsio::hdu::HduInfo;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;

use super::header::RECORD_LEN;
use super::{Error, Frame, FrameHeader, Result};

impl Frame {
    /// Load the primary image of a FITS file.
    ///
    /// Pixels are read as f32 with BZERO/BSCALE applied by cfitsio. 2-D images
    /// and 3-D images with a single plane are accepted. Every header card
    /// except the structural ones is kept verbatim.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Frame> {
        let path = path.as_ref();
        let read_err = |source| Error::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut fptr = open(path)?;
        let hdu = fptr.primary_hdu().map_err(read_err)?;

        let shape = match &hdu.info {
            HduInfo::ImageInfo { shape, .. } => shape.clone(),
            _ => {
                return Err(Error::NotAnImage {
                    path: path.to_path_buf(),
                })
            }
        };

        let Some((width, height)) = plane_dimensions(&shape) else {
            return Err(Error::UnsupportedShape {
                path: path.to_path_buf(),
                shape,
            });
        };

        let header = read_header(&mut fptr).map_err(read_err)?;
        let pixels: Vec<f32> = hdu.read_image(&mut fptr).map_err(read_err)?;
        if pixels.len() != width * height {
            return Err(Error::UnsupportedShape {
                path: path.to_path_buf(),
                shape,
            });
        }

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            cards = header.len(),
            "Loaded frame"
        );

        Ok(Frame::new(width, height, pixels).with_header(header))
    }

    /// Read only the primary header, without decoding any pixels.
    pub fn load_header<P: AsRef<Path>>(path: P) -> Result<FrameHeader> {
        let path = path.as_ref();
        let mut fptr = open(path)?;
        read_header(&mut fptr).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the frame as a BITPIX -32 primary image, replacing any existing
    /// file. Parent directories are created. Header cards read from a file are
    /// written back unchanged.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let description = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &[self.height(), self.width()],
        };

        let mut fptr = FitsFile::create(path)
            .with_custom_primary(&description)
            .overwrite()
            .open()
            .map_err(write_err)?;
        let hdu = fptr.primary_hdu().map_err(write_err)?;
        hdu.write_image(&mut fptr, self.pixels())
            .map_err(write_err)?;
        write_records(&mut fptr, self.header.records()).map_err(write_err)?;

        tracing::debug!(path = %path.display(), width = self.width(), height = self.height(), "Saved frame");
        Ok(())
    }
}

fn open(path: &Path) -> Result<FitsFile> {
    FitsFile::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// All records of the current HDU, END excluded.
fn read_header(fptr: &mut FitsFile) -> fitsio::errors::Result<FrameHeader> {
    // SAFETY: the pointer comes from an open FitsFile borrowed for this call.
    let raw = unsafe { fptr.as_raw() };
    let mut status: c_int = 0;
    let mut count: c_int = 0;
    let mut more: c_int = 0;
    // SAFETY: every out-parameter points to a live local.
    unsafe { fitsio::sys::ffghsp(raw, &mut count, &mut more, &mut status) };
    check_status(status)?;

    let mut records = Vec::with_capacity(count.max(0) as usize);
    let mut buffer: [c_char; RECORD_LEN + 1] = [0; RECORD_LEN + 1];
    for n in 1..=count {
        // SAFETY: cfitsio writes at most 80 characters plus NUL into `buffer`.
        unsafe { fitsio::sys::ffgrec(raw, n, buffer.as_mut_ptr(), &mut status) };
        check_status(status)?;
        // SAFETY: `buffer` was NUL-terminated by the call above.
        let record = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        records.push(record.to_string_lossy().into_owned());
    }
    Ok(FrameHeader::from_records(records.iter().map(String::as_str)))
}

/// Append records to the current HDU.
fn write_records(fptr: &mut FitsFile, records: impl Iterator<Item = String>) -> fitsio::errors::Result<()> {
    // SAFETY: the pointer comes from an open FitsFile borrowed for this call.
    let raw = unsafe { fptr.as_raw() };
    for record in records {
        let card = CString::new(record)?;
        let mut status: c_int = 0;
        // SAFETY: `card` is a NUL-terminated string alive for the call.
        unsafe { fitsio::sys::ffprec(raw, card.as_ptr(), &mut status) };
        check_status(status)?;
    }
    Ok(())
}

/// Width and height of a single image plane.
///
/// cfitsio reports the shape slowest axis first: `[NAXIS2, NAXIS1]` or
/// `[NAXIS3, NAXIS2, NAXIS1]`.
fn plane_dimensions(shape: &[usize]) -> Option<(usize, usize)> {
    let (width, height) = match *shape {
        [h, w] | [1, h, w] => (w, h),
        _ => return None,
    };
    (width > 0 && height > 0).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HeaderValue;

    #[test]
    fn test_plane_dimensions() {
        assert_eq!(plane_dimensions(&[2, 3]), Some((3, 2)));
        assert_eq!(plane_dimensions(&[1, 4, 5]), Some((5, 4)));
        assert_eq!(plane_dimensions(&[3, 4, 5]), None);
        assert_eq!(plane_dimensions(&[10]), None);
        assert_eq!(plane_dimensions(&[0, 5]), None);
    }

    #[test]
    fn test_save_load_keeps_pixels_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/frame.fits");

        let mut frame = Frame::new(3, 2, vec![1.0, -2.5, 3.0, 4.0, 5.5, f32::NAN]);
        frame.header.set("IMAGETYP", "Light Frame");
        frame.header.set("EXPTIME", 30.5);
        frame.header.set("XBINNING", 2i64);
        frame.header.set("CUSTKEY", "kept");
        frame.save(&path).unwrap();

        let loaded = Frame::load(&path).unwrap();
        assert_eq!(loaded.width(), 3);
        assert_eq!(loaded.height(), 2);
        assert_eq!(&loaded.pixels()[..5], &frame.pixels()[..5]);
        assert!(loaded.pixels()[5].is_nan());
        assert_eq!(loaded.image_type("IMAGETYP").as_deref(), Some("LIGHT FRAME"));
        assert_eq!(loaded.exposure_time("EXPTIME"), Some(30.5));
        assert_eq!(loaded.header.get("XBINNING"), Some(&HeaderValue::Int(2)));
        assert_eq!(loaded.header.get_text("CUSTKEY").as_deref(), Some("kept"));
    }

    #[test]
    fn test_arbitrary_cards_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.fits");
        let second = dir.path().join("second.fits");

        let mut frame = Frame::filled(2, 2, 1.0);
        frame.header = FrameHeader::from_records([
            "CTYPE1  = 'RA---TAN'           / projection",
            "CRVAL1  =           83.8221000 / reference RA",
            "CD1_1   =         -2.77778E-04",
            "CUSTKEY = 'x       '",
            "HISTORY reduced at the telescope",
        ]);
        frame.save(&first).unwrap();

        Frame::load(&first).unwrap().save(&second).unwrap();
        let loaded = Frame::load(&second).unwrap();
        assert_eq!(loaded.header.get_text("CTYPE1").as_deref(), Some("RA---TAN"));
        assert_eq!(loaded.header.get_f64("CRVAL1"), Some(83.8221));
        assert_eq!(loaded.header.get_f64("CD1_1"), Some(-2.77778e-4));
        assert_eq!(loaded.header.get_text("CUSTKEY").as_deref(), Some("x"));
        assert!(loaded
            .header
            .iter()
            .any(|card| card.keyword() == "HISTORY"));
        assert!(loaded.header.records().any(|r| r.contains("/ reference RA")));
        assert!(loaded.header.get("NAXIS1").is_none());
        assert!(loaded.header.get("BITPIX").is_none());
    }

    #[test]
    fn test_quoted_number_stays_text_after_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.fits");

        let mut frame = Frame::filled(2, 2, 1.0);
        frame.header.set("OBJECT", "3000");
        frame.save(&path).unwrap();

        let loaded = Frame::load(&path).unwrap();
        assert_eq!(
            loaded.header.get("OBJECT"),
            Some(&HeaderValue::Text("3000".to_string()))
        );
    }

    #[test]
    fn test_load_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.fits");

        let mut frame = Frame::filled(4, 4, 2.0);
        frame.header.set("IMAGETYP", "BIAS");
        frame.save(&path).unwrap();

        let header = Frame::load_header(&path).unwrap();
        assert_eq!(header.get_text("IMAGETYP").as_deref(), Some("BIAS"));
        assert!(header.get("NAXIS").is_none());
        assert!(matches!(
            Frame::load_header(dir.path().join("missing.fits")),
            Err(Error::Open { .. })
        ));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.fits");

        Frame::filled(2, 2, 1.0).save(&path).unwrap();
        Frame::filled(4, 1, 7.0).save(&path).unwrap();

        let loaded = Frame::load(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (4, 1));
        assert!(loaded.pixels().iter().all(|&p| p == 7.0));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Frame::load("/nonexistent/ccdcal/frame.fits").unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/ccdcal/frame.fits"));
    }

    #[test]
    fn test_load_non_fits_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.fits");
        std::fs::write(&path, "not a fits file").unwrap();
        assert!(Frame::load(&path).is_err());
    }
}
