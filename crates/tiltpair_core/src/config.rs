//! Picker session configuration.
//!
//! # Responsibility
//! - Describe one picking session: selfile, output directory and family.
//! - Load and validate it from JSON.

use crate::model::family::{Family, FamilyError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<FamilyError> for ConfigError {
    fn from(value: FamilyError) -> Self {
        Self::Invalid(value.to_string())
    }
}

/// Settings for one picking session.
///
/// `selfile` accepts the `block@path` address form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerConfig {
    pub selfile: String,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub family: Family,
}

impl PickerConfig {
    pub fn new(selfile: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            selfile: selfile.into(),
            output_dir: output_dir.into(),
            family: Family::default(),
        }
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selfile.trim().is_empty() {
            return Err(ConfigError::Invalid("selfile cannot be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "output_dir cannot be empty".to_string(),
            ));
        }
        self.family.validate()?;
        Ok(())
    }
}
