//! Persistent settings stored as `config.toml` under the app directory.
//!
//! Missing file means defaults; out-of-range values are clamped on load so a
//! hand-edited config cannot wedge the client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{app_dirs, model::ScalerKind};

/// Filename of the settings file inside the app root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_UPLOAD_LIMIT_MB: u64 = 512;

fn default_base_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_upload_limit_mb() -> u64 {
    64
}

/// Settings that belong in the TOML config file.
///
/// Config keys: `service` (`base_url`, `timeout_secs`, `upload_limit_mb`),
/// `default_scaler`, `downloads_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    /// Scaler preselected for XGBoost runs.
    #[serde(default)]
    pub default_scaler: ScalerKind,
    /// Optional override for where run artifacts are downloaded.
    #[serde(default)]
    pub downloads_dir: Option<PathBuf>,
}

/// Where and how to reach the compute service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request ceiling; model runs can be slow, but not unbounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest file selection the client will attempt to upload.
    #[serde(default = "default_upload_limit_mb")]
    pub upload_limit_mb: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            upload_limit_mb: default_upload_limit_mb(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            default_scaler: ScalerKind::default(),
            downloads_dir: None,
        }
    }
}

impl AppConfig {
    fn normalized(mut self) -> Self {
        self.service.timeout_secs = self
            .service
            .timeout_secs
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        self.service.upload_limit_mb = self.service.upload_limit_mb.clamp(1, MAX_UPLOAD_LIMIT_MB);
        self.service.base_url = self.service.base_url.trim_end_matches('/').to_string();
        if self.service.base_url.is_empty() {
            self.service.base_url = default_base_url();
        }
        self
    }

    /// Upload ceiling in bytes.
    pub fn upload_limit_bytes(&self) -> u64 {
        self.service.upload_limit_mb * 1024 * 1024
    }
}

/// Errors that can occur while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No suitable config directory available")]
    NoConfigDir,
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config for {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Resolve the configuration file path, ensuring the app directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from disk, returning defaults if the file is missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    load_from_path(&path)
}

/// Load configuration from a specific path; missing file means defaults.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AppConfig>(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(AppConfig::normalized)
}

/// Persist configuration to the default location.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Save configuration to a specific path, creating parent directories.
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

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
