//! Loading and saving the configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{EscapePolicy, Ini};
use thiserror::Error;

use super::keys::ConfigKey;
use crate::catalog::{
    CatalogConfig, Mirror, DEFAULT_ADDONS_PATH, DEFAULT_CATALOG_BASE_URL, DEFAULT_EFFECTS_PATH,
};
use crate::logging::LoggingConfig;
use crate::manager::{ManagerConfig, DEFAULT_PROGRESS_INTERVAL};
use crate::variant::FrameworkVariant;

const CONFIG_DIR_NAME: &str = "shadekeeper";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors reading, writing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
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

    #[error("Malformed config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Default directory for log files.
pub fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR_NAME)
        .join("logs")
}

/// `[framework]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkSettings {
    pub stock_dir: Option<PathBuf>,
    pub open_dir: Option<PathBuf>,
    pub staging_dir: PathBuf,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            stock_dir: None,
            open_dir: None,
            staging_dir: ManagerConfig::default().staging_dir,
        }
    }
}

/// `[catalog]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub base_url: String,
    pub effects_path: String,
    pub addons_path: String,
    pub mirror_prefix: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            effects_path: DEFAULT_EFFECTS_PATH.to_string(),
            addons_path: DEFAULT_ADDONS_PATH.to_string(),
            mirror_prefix: None,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    pub progress_interval_ms: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: ManagerConfig::default().timeout.as_secs(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: default_log_dir(),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub framework: FrameworkSettings,
    pub catalog: CatalogSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`]. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file_noescape(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let Some(section) = section else { continue };
            for (key, value) in properties.iter() {
                match ConfigKey::lookup(section, key) {
                    Some(config_key) => config_key.set(&mut config, value)?,
                    None => {
                        tracing::warn!(section, key, "Ignoring unknown configuration key");
                    }
                }
            }
        }
        Ok(config)
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its directory. Unset optional keys are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        ini.write_to_file_policy(path, EscapePolicy::Nothing)
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Configured install directory of `variant`, if any.
    pub fn variant_dir(&self, variant: FrameworkVariant) -> Option<&Path> {
        match variant {
            FrameworkVariant::Stock => self.framework.stock_dir.as_deref(),
            FrameworkVariant::Open => self.framework.open_dir.as_deref(),
        }
    }

    /// Session configuration derived from these settings.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::new(self.framework.staging_dir.clone())
            .with_timeout(Duration::from_secs(self.download.timeout_secs))
            .with_progress_interval(Duration::from_millis(self.download.progress_interval_ms))
    }

    /// Catalog location derived from these settings.
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::default()
            .with_base_url(self.catalog.base_url.clone())
            .with_effects_path(self.catalog.effects_path.clone())
            .with_addons_path(self.catalog.addons_path.clone())
            .with_mirror(self.mirror())
    }

    /// The configured download mirror.
    pub fn mirror(&self) -> Mirror {
        Mirror::from_prefix(self.catalog.mirror_prefix.as_deref())
    }

    /// Logging setup derived from these settings.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new(self.logging.level.clone())
            .with_directory(self.logging.directory.clone())
    }
}
