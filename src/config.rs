//! TOML-based application configuration.
//!
//! Stored at `<config dir>/cyclecast/config.toml`; `CYCLECAST_CONFIG`
//! points at an alternate file. Missing keys fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::prediction::DatePolicy;

pub const CONFIG_ENV: &str = "CYCLECAST_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not write config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("config directory not found")]
    NoConfigDir,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionConfig {
    /// Reject logs with malformed dates instead of skipping them.
    #[serde(default)]
    pub strict_dates: bool,
    #[serde(default = "default_true")]
    pub show_fertility: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Overrides the vault directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            strict_dates: false,
            show_fertility: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: None,
            prediction: PredictionConfig::default(),
        }
    }
}

impl Config {
    /// `$CYCLECAST_CONFIG`, else `<config dir>/cyclecast/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("cyclecast")
            .join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// A missing file yields defaults; a malformed one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn date_policy(&self) -> DatePolicy {
        if self.prediction.strict_dates {
            DatePolicy::Strict
        } else {
            DatePolicy::Permissive
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "log_level" => Some(self.log_level.clone()),
            "data_dir" => Some(
                self.data_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            "prediction.strict_dates" => Some(self.prediction.strict_dates.to_string()),
            "prediction.show_fertility" => Some(self.prediction.show_fertility.to_string()),
            _ => None,
        }
    }

    /// Set a dotted key. An empty `data_dir` clears the override.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "log_level" => {
                if value.parse::<tracing::Level>().is_err() {
                    return Err(invalid());
                }
                self.log_level = value.to_lowercase();
            }
            "data_dir" => {
                self.data_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "prediction.strict_dates" => {
                self.prediction.strict_dates = value.parse().map_err(|_| invalid())?;
            }
            "prediction.show_fertility" => {
                self.prediction.show_fertility = value.parse().map_err(|_| invalid())?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
