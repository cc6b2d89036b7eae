use std::fmt;
use std::path::{Path, PathBuf};

use strum_macros::Display;

use crate::frame::FrameHeader;

/// A calibration stage and the letter it leaves in file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Bias,
    Dark,
    Flat,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Bias, Stage::Dark, Stage::Flat];

    pub fn letter(self) -> char {
        match self {
            Stage::Bias => 'b',
            Stage::Dark => 'd',
            Stage::Flat => 'f',
        }
    }

    /// Header keyword naming the master used for this stage.
    pub fn header_keyword(self) -> &'static str {
        match self {
            Stage::Bias => "BIASCORR",
            Stage::Dark => "DARKCORR",
            Stage::Flat => "FLATCORR",
        }
    }
}

/// A set of calibration stages. Applied stages are recorded in the header
/// (`BIASCORR`, `DARKCORR`, `FLATCORR`) and in the file name as `-b`, `-d`,
/// `-f`, `-bd`, `-bf`, `-df` or `-bdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stages {
    bias: bool,
    dark: bool,
    flat: bool,
}

impl Stages {
    pub fn none() -> Self {
        Self::default()
    }

    /// Stages whose marker card is present in `header`.
    pub fn from_header(header: &FrameHeader) -> Self {
        Stage::ALL
            .into_iter()
            .filter(|stage| header.get(stage.header_keyword()).is_some())
            .fold(Stages::none(), Stages::with)
    }

    pub fn contains(self, stage: Stage) -> bool {
        match stage {
            Stage::Bias => self.bias,
            Stage::Dark => self.dark,
            Stage::Flat => self.flat,
        }
    }

    pub fn with(mut self, stage: Stage) -> Self {
        match stage {
            Stage::Bias => self.bias = true,
            Stage::Dark => self.dark = true,
            Stage::Flat => self.flat = true,
        }
        self
    }

    pub fn is_empty(self) -> bool {
        !(self.bias || self.dark || self.flat)
    }

    /// Parse a suffix body such as `bd`. Letters must be distinct and in
    /// `b`, `d`, `f` order.
    pub fn parse(letters: &str) -> Option<Self> {
        if letters.is_empty() {
            return None;
        }
        let mut stages = Stages::none();
        let mut next = 0;
        for c in letters.chars() {
            let idx = Stage::ALL[next..].iter().position(|s| s.letter() == c)?;
            let stage = Stage::ALL[next + idx];
            stages = stages.with(stage);
            next += idx + 1;
        }
        Some(stages)
    }

    /// Split a file stem into its base and the stages its suffix encodes.
    /// A stem without a valid suffix is returned whole with no stages.
    pub fn split_stem(stem: &str) -> (&str, Stages) {
        if let Some((base, letters)) = stem.rsplit_once('-') {
            if !base.is_empty() {
                if let Some(stages) = Stages::parse(letters) {
                    return (base, stages);
                }
            }
        }
        (stem, Stages::none())
    }

    /// `-` plus the stage letters, or an empty string.
    pub fn suffix(self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let letters: String = Stage::ALL
            .iter()
            .filter(|s| self.contains(**s))
            .map(|s| s.letter())
            .collect();
        format!("-{}", letters)
    }
}

impl fmt::Display for Stages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix())
    }
}

/// Path of the frame produced by applying `stage` to `path`, a frame that
/// already went through `applied`.
///
/// The name suffix is only trusted when it agrees with `applied`, so a raw
/// frame whose name happens to end in `-b` keeps its whole stem:
/// `x.fits` + bias → `x-b.fits`, `x-b.fits` (bias applied) + dark →
/// `x-bd.fits`, `x-b.fits` (raw) + dark → `x-b-d.fits`. The directory and
/// extension are kept.
pub fn derive_output_path(path: &Path, applied: Stages, stage: Stage) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = match Stages::split_stem(&stem) {
        (base, named) if named == applied => base,
        _ => stem.as_str(),
    };
    let mut name = format!("{}{}", base, applied.with(stage).suffix());
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ordered_subsets() {
        assert_eq!(Stages::parse("b"), Some(Stages::none().with(Stage::Bias)));
        assert_eq!(
            Stages::parse("bdf"),
            Some(Stages::none().with(Stage::Bias).with(Stage::Dark).with(Stage::Flat))
        );
        assert_eq!(Stages::parse("df").map(|s| s.suffix()).as_deref(), Some("-df"));
        assert_eq!(Stages::parse(""), None);
        assert_eq!(Stages::parse("db"), None);
        assert_eq!(Stages::parse("bb"), None);
        assert_eq!(Stages::parse("x"), None);
    }

    #[test]
    fn test_split_stem() {
        assert_eq!(Stages::split_stem("m31_001"), ("m31_001", Stages::none()));
        let (base, stages) = Stages::split_stem("m31-001-bd");
        assert_eq!(base, "m31-001");
        assert_eq!(stages.suffix(), "-bd");
        // not a stage suffix
        assert_eq!(Stages::split_stem("ngc-7000"), ("ngc-7000", Stages::none()));
        assert_eq!(Stages::split_stem("-b"), ("-b", Stages::none()));
        // a 'b' inside the name is not touched
        assert_eq!(Stages::split_stem("bubble-b").0, "bubble");
    }

    #[test]
    fn test_derive_output_path() {
        let none = Stages::none();
        let b = none.with(Stage::Bias);
        let d = none.with(Stage::Dark);
        let bd = b.with(Stage::Dark);
        let cases = [
            ("/data/x.fits", none, Stage::Bias, "/data/x-b.fits"),
            ("/data/x-b.fits", b, Stage::Dark, "/data/x-bd.fits"),
            ("/data/x-bd.fits", bd, Stage::Flat, "/data/x-bdf.fits"),
            ("/data/x.fits", none, Stage::Dark, "/data/x-d.fits"),
            ("/data/x-d.fit", d, Stage::Flat, "/data/x-df.fit"),
            ("rel/x-f.FITS", none.with(Stage::Flat), Stage::Bias, "rel/x-bf.FITS"),
            // raw frames whose names look like stage suffixes
            ("/data/m31-b.fits", none, Stage::Bias, "/data/m31-b-b.fits"),
            ("/data/m31-b.fits", none, Stage::Dark, "/data/m31-b-d.fits"),
            ("/data/m31-b-b.fits", b, Stage::Dark, "/data/m31-b-bd.fits"),
            // applied stages missing from the name
            ("/data/x.fits", b, Stage::Dark, "/data/x-bd.fits"),
        ];
        for (input, applied, stage, expected) in cases {
            assert_eq!(
                derive_output_path(Path::new(input), applied, stage),
                PathBuf::from(expected),
                "{} {} + {}",
                input,
                applied,
                stage
            );
        }
    }

    #[test]
    fn test_output_never_equals_input_for_new_stage() {
        let names = ["x", "x-b", "x-d", "x-bd", "x-bdf", "m31-b-b", "ngc-7000"];
        for name in names {
            let path = PathBuf::from(format!("/data/{}.fits", name));
            for applied in ["b", "d", "f", "bd", "bf", "df"]
                .into_iter()
                .filter_map(Stages::parse)
                .chain([Stages::none()])
            {
                for stage in Stage::ALL.into_iter().filter(|s| !applied.contains(*s)) {
                    assert_ne!(derive_output_path(&path, applied, stage), path, "{} {} + {}", name, applied, stage);
                }
            }
        }
    }

    #[test]
    fn test_from_header() {
        let mut header = FrameHeader::new();
        assert_eq!(Stages::from_header(&header), Stages::none());
        header.set("BIASCORR", "masterbias.fits");
        header.set("FLATCORR", "masterflat_V_norm.fits");
        assert_eq!(Stages::from_header(&header).suffix(), "-bf");
    }

    #[test]
    fn test_header_keywords() {
        assert_eq!(Stage::Bias.header_keyword(), "BIASCORR");
        assert_eq!(Stage::Dark.header_keyword(), "DARKCORR");
        assert_eq!(Stage::Flat.header_keyword(), "FLATCORR");
    }
}
