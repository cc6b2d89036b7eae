use std::path::PathBuf;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

use super::{CalibConfig, ConfigError};

const DATA_STRUCTURE: &str = "DATA_STRUCTURE";
const HEADER_SPECIFICATION: &str = "HEADER_SPECIFICATION";
const IMAGE_PROCESSING: &str = "IMAGE_PROCESSING";
const LOGGING: &str = "LOGGING";

/// Filters accepted when no `supported_filters` key is configured.
pub const DEFAULT_FILTERS: &[&str] = &["U", "B", "V", "R", "I", "Haw", "Han", "None", "-"];

/// Default sigma for bias frame clipping.
pub const DEFAULT_BIAS_SIGMA: f64 = 3.0;

/// Master bias combination method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum BiasMethod {
    /// Per-pixel sigma clipping around the median, then median of survivors.
    #[default]
    MedianSigmaClipped,
}

/// Master dark combination method. Both variants scale every dark to one
/// second of exposure before combining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum DarkMethod {
    #[default]
    ScaledExposureMedian,
    ScaledExposureAverage,
}

impl DarkMethod {
    /// Parse a method name, falling back to the median for unknown names.
    pub fn parse_or_default(name: &str) -> Self {
        match DarkMethod::from_str(name.trim()) {
            Ok(method) => method,
            Err(_) => {
                tracing::warn!(
                    method = name,
                    fallback = %DarkMethod::default(),
                    "Unsupported dark combination method, using median"
                );
                DarkMethod::default()
            }
        }
    }
}

/// Header keywords and the image-type labels they are compared against.
///
/// Labels are stored trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLabels {
    pub image_type_keyword: String,
    pub exposure_keyword: String,
    pub filter_keyword: String,
    pub bias: String,
    pub dark: String,
    pub flat: String,
    pub object: String,
}

impl Default for FrameLabels {
    fn default() -> Self {
        Self {
            image_type_keyword: "IMAGETYP".to_string(),
            exposure_keyword: "EXPTIME".to_string(),
            filter_keyword: "FILTER".to_string(),
            bias: "BIAS".to_string(),
            dark: "DARK".to_string(),
            flat: "FLAT".to_string(),
            object: "OBJECT".to_string(),
        }
    }
}

/// Typed view of the configuration used by every tool.
///
/// `results_dir` may appear in configuration files but nothing is written
/// there; results go to `working_dir` and `results_aux_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibSettings {
    pub working_dir: PathBuf,
    pub results_aux_dir: PathBuf,

    pub labels: FrameLabels,
    pub supported_filters: Vec<String>,

    pub bias_subtraction: bool,
    pub bias_method: String,
    pub bias_sigma: f64,

    pub dark_correction: bool,
    pub dark_method: DarkMethod,

    pub flat_correction: bool,

    pub log_dir: Option<PathBuf>,
}

impl Default for CalibSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            results_aux_dir: PathBuf::from("results/aux"),
            labels: FrameLabels::default(),
            supported_filters: DEFAULT_FILTERS.iter().map(|s| s.to_string()).collect(),
            bias_subtraction: true,
            bias_method: BiasMethod::default().to_string(),
            bias_sigma: DEFAULT_BIAS_SIGMA,
            dark_correction: true,
            dark_method: DarkMethod::default(),
            flat_correction: true,
            log_dir: None,
        }
    }
}

impl CalibSettings {
    pub fn from_config(config: &CalibConfig) -> Result<Self, ConfigError> {
        let defaults = CalibSettings::default();
        let label = |key: &str, default: &str| {
            config
                .get_str(HEADER_SPECIFICATION, key, default)
                .trim()
                .to_uppercase()
        };
        let keyword = |key: &str, default: &str| {
            config
                .get_str(HEADER_SPECIFICATION, key, default)
                .trim()
                .to_string()
        };
        let dir = |key: &str, default: &PathBuf| {
            config
                .get(DATA_STRUCTURE, key)
                .map(|v| PathBuf::from(v.to_string()))
                .unwrap_or_else(|| default.clone())
        };

        let labels = FrameLabels {
            image_type_keyword: keyword("image_type_keyword", &defaults.labels.image_type_keyword),
            exposure_keyword: keyword("exposure_keyword", &defaults.labels.exposure_keyword),
            filter_keyword: keyword("filter_keyword", &defaults.labels.filter_keyword),
            bias: label("bias_label", &defaults.labels.bias),
            dark: label("dark_label", &defaults.labels.dark),
            flat: label("flat_label", &defaults.labels.flat),
            object: label("object_label", &defaults.labels.object),
        };

        let bias_sigma = config.get_f64(IMAGE_PROCESSING, "bias_subtraction_sigma", DEFAULT_BIAS_SIGMA)?;
        if bias_sigma.is_nan() || bias_sigma <= 0.0 {
            return Err(ConfigError::InvalidValue {
                section: IMAGE_PROCESSING.to_string(),
                key: "bias_subtraction_sigma".to_string(),
                message: format!("sigma must be positive, got {}", bias_sigma),
            });
        }

        Ok(Self {
            working_dir: dir("working_dir", &defaults.working_dir),
            results_aux_dir: dir("results_aux_dir", &defaults.results_aux_dir),
            labels,
            supported_filters: config.get_list(HEADER_SPECIFICATION, "supported_filters", DEFAULT_FILTERS),
            bias_subtraction: config.get_bool(IMAGE_PROCESSING, "bias_subtraction", true)?,
            bias_method: config.get_str(
                IMAGE_PROCESSING,
                "bias_subtraction_method",
                &defaults.bias_method,
            ),
            bias_sigma,
            dark_correction: config.get_bool(IMAGE_PROCESSING, "dark_correction", true)?,
            dark_method: config
                .get(IMAGE_PROCESSING, "dark_correction_method")
                .map(|v| DarkMethod::parse_or_default(&v.to_string()))
                .unwrap_or_default(),
            flat_correction: config.get_bool(IMAGE_PROCESSING, "flat_correction", true)?,
            log_dir: config.get(LOGGING, "log_dir").map(|v| PathBuf::from(v.to_string())),
        })
    }

    /// Load and convert a configuration file in one step.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_config(&CalibConfig::from_file(path)?)
    }

    /// Filter names are matched exactly against the supported list.
    pub fn is_supported_filter(&self, filter: &str) -> bool {
        self.supported_filters.iter().any(|f| f == filter)
    }
}
