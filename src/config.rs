use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::Error as SerdeDeError};
use thiserror::Error;

use crate::{app_dirs, ml::forest::TrainOptions};

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// App settings that belong in the TOML config file.
///
/// Every field has a serde default so configs written by older builds keep
/// loading after new knobs appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional override for the directory holding tracker files.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
    /// User key assumed when a command does not name one.
    #[serde(default = "default_user")]
    pub default_user: String,
    #[serde(default)]
    pub training: TrainingSettings,
}

/// Knobs for the outcome estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Number of bagged trees in the forest.
    #[serde(default = "default_trees")]
    pub trees: usize,
    /// Seed shared by bootstrap sampling, the holdout shuffle and cross-validation.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of usable rows held out for evaluation.
    #[serde(default = "default_holdout")]
    pub holdout: f64,
    /// Number of cross-validation folds.
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Minimum usable rows before training is attempted.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            default_user: default_user(),
            training: TrainingSettings::default(),
        }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            trees: default_trees(),
            seed: default_seed(),
            holdout: default_holdout(),
            folds: default_folds(),
            min_rows: default_min_rows(),
        }
    }
}

impl From<&TrainingSettings> for TrainOptions {
    fn from(settings: &TrainingSettings) -> Self {
        TrainOptions {
            trees: settings.trees,
            seed: settings.seed,
            holdout: settings.holdout,
            folds: settings.folds,
            min_rows: settings.min_rows,
        }
    }
}

/// Errors that may occur while loading or saving app configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from disk, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    load_from(&path)
}

/// Persist configuration to disk, overwriting any previous contents.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

fn default_user() -> String {
    "default".to_string()
}

fn default_trees() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_holdout() -> f64 {
    0.2
}

fn default_folds() -> usize {
    5
}

fn default_min_rows() -> usize {
    8
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
