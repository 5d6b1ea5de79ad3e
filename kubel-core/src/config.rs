//! TOML configuration with platform config paths and environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::text::{DEFAULT_FALLBACK_ENCODING, encoding_for_label};

/// Default number of duplicate reports shown in a summary.
pub const DEFAULT_DUPLICATE_PREVIEW: usize = 20;

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading configuration.
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for [`AppConfig`].
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending key.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
    /// No platform config directory could be determined.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Application configuration, usually `~/.config/kubel/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parsing and reporting settings.
    pub import: ImportConfig,
    /// Registry file locations.
    pub sources: SourcesConfig,
    /// Address store backend.
    pub store: StoreConfig,
}

/// Settings for reading registry files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Field delimiter; must be a single ASCII character.
    pub delimiter: char,
    /// Whether the first row of each file is a header.
    pub skip_header: bool,
    /// Encoding label tried when a file is not UTF-8.
    pub fallback_encoding: String,
    /// Maximum duplicate reports kept in a summary.
    pub duplicate_preview_limit: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: ';',
            skip_header: true,
            fallback_encoding: DEFAULT_FALLBACK_ENCODING.to_owned(),
            duplicate_preview_limit: DEFAULT_DUPLICATE_PREVIEW,
        }
    }
}

impl ImportConfig {
    /// The delimiter as a byte.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for non-ASCII delimiters.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "import.delimiter".to_owned(),
                reason: format!("{:?} is not a single ASCII character", self.delimiter),
            })
    }
}

/// Default registry file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Commercial registry file.
    pub commercial: Option<PathBuf>,
    /// Residential registry file.
    pub residential: Option<PathBuf>,
}

/// Address store backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of a REST address service; takes precedence when set.
    pub base_url: Option<String>,
    /// JSON snapshot file used when no URL is set.
    pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `path`, or from the platform config file when `None`.
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let config: Self = if path.exists() {
            debug!("Loading config from {}", path.display());
            toml::from_str(&fs::read_to_string(&path)?)?
        } else {
            debug!("Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load, then apply environment overrides:
    /// - `KUBEL_STORE_URL`: store base URL
    /// - `KUBEL_SNAPSHOT_PATH`: JSON snapshot file
    /// - `KUBEL_FALLBACK_ENCODING`: fallback encoding label
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("KUBEL_STORE_URL") {
            info!("Override store.base_url from env: {url}");
            self.store.base_url = Some(url);
        }
        if let Some(path) = lookup("KUBEL_SNAPSHOT_PATH") {
            info!("Override store.snapshot_path from env: {path}");
            self.store.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(label) = lookup("KUBEL_FALLBACK_ENCODING") {
            info!("Override import.fallback_encoding from env: {label}");
            self.import.fallback_encoding = label;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.import.delimiter_byte()?;
        encoding_for_label(&self.import.fallback_encoding).map_err(|err| {
            ConfigError::InvalidValue {
                field: "import.fallback_encoding".to_owned(),
                reason: err.to_string(),
            }
        })?;
        Ok(())
    }

    /// Platform config file location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when no home directory is known.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("org", "kubel", "kubel").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Platform data directory, used for logs and the default snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when no home directory is known.
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("org", "kubel", "kubel").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}
