//! Calibration configuration: INI-style sections with type-inferred values.
//!
//! ```text
//! [DATA_STRUCTURE]
//! working_dir = /data/night1/work
//!
//! [IMAGE_PROCESSING]
//! bias_subtraction = true
//! bias_subtraction_sigma = 3.0
//! ```

mod settings;


use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use settings::{BiasMethod, CalibSettings, DarkMethod, FrameLabels};

/// Errors produced while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration is empty or has no sections")]
    Empty,

    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Invalid value for [{section}] {key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

/// A configuration value with its type inferred from the raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<String>),
    Str(String),
}

impl Value {
    /// Infer the type of a raw value.
    ///
    /// Order: boolean, comma-separated list, integer, float, string.
    pub fn infer(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if raw.contains(',') {
            return Value::List(raw.split(',').map(|v| v.trim().to_string()).collect());
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Value::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return Value::Float(v);
        }
        Value::Str(raw.to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Lists are returned as-is; a scalar becomes a one-element list.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::List(items) => write!(f, "{}", items.join(", ")),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One `[SECTION]` with its entries in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    entries: Vec<(String, Value)>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// Parsed configuration file. Section and key names keep their case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibConfig {
    sections: Vec<(String, Section)>,
}

impl CalibConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), sections = config.sections.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = CalibConfig::default();
        let mut current: Option<usize> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| ConfigError::Syntax {
                    line: line_no,
                    message: format!("unterminated section header '{}'", line),
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::Syntax {
                        line: line_no,
                        message: "empty section name".to_string(),
                    });
                }
                current = Some(config.section_index(name));
                continue;
            }

            let Some(section_idx) = current else {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "entry before the first section header".to_string(),
                });
            };

            let split_at = line.find(['=', ':']).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: format!("expected 'key = value', got '{}'", line),
            })?;
            let key = line[..split_at].trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "missing key".to_string(),
                });
            }
            let value = Value::infer(&line[split_at + 1..]);
            config.sections[section_idx]
                .1
                .insert(key.to_string(), value);
        }

        if config.sections.is_empty() {
            return Err(ConfigError::Empty);
        }
        Ok(config)
    }

    fn section_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self.sections.iter().position(|(n, _)| n == name) {
            return idx;
        }
        self.sections.push((name.to_string(), Section::default()));
        self.sections.len() - 1
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.get_section(section)?.get(key)
    }

    pub fn get_section(&self, section: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(n, _)| n == section)
            .map(|(_, s)| s)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    /// String value, or `default` when missing.
    pub fn get_str(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(section, key) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| invalid(section, key, format!("expected true/false, got '{}'", v))),
        }
    }

    pub fn get_f64(&self, section: &str, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get(section, key) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| invalid(section, key, format!("expected a number, got '{}'", v))),
        }
    }

    pub fn get_list(&self, section: &str, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(section, key) {
            Some(v) => v.as_list(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn invalid(section: &str, key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        message,
    }
}
