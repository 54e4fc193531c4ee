//! Typed access to individual configuration keys.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

use super::file::{ConfigError, ConfigFile};

/// A `section.key` configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    FrameworkStockDir,
    FrameworkOpenDir,
    FrameworkStagingDir,
    CatalogBaseUrl,
    CatalogEffectsPath,
    CatalogAddonsPath,
    CatalogMirrorPrefix,
    DownloadTimeout,
    DownloadProgressIntervalMs,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::FrameworkStockDir,
            Self::FrameworkOpenDir,
            Self::FrameworkStagingDir,
            Self::CatalogBaseUrl,
            Self::CatalogEffectsPath,
            Self::CatalogAddonsPath,
            Self::CatalogMirrorPrefix,
            Self::DownloadTimeout,
            Self::DownloadProgressIntervalMs,
            Self::LoggingLevel,
            Self::LoggingDirectory,
        ]
    }

    /// INI section of the key.
    pub fn section(self) -> &'static str {
        match self {
            Self::FrameworkStockDir | Self::FrameworkOpenDir | Self::FrameworkStagingDir => {
                "framework"
            }
            Self::CatalogBaseUrl
            | Self::CatalogEffectsPath
            | Self::CatalogAddonsPath
            | Self::CatalogMirrorPrefix => "catalog",
            Self::DownloadTimeout | Self::DownloadProgressIntervalMs => "download",
            Self::LoggingLevel | Self::LoggingDirectory => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(self) -> &'static str {
        match self {
            Self::FrameworkStockDir => "stock_dir",
            Self::FrameworkOpenDir => "open_dir",
            Self::FrameworkStagingDir => "staging_dir",
            Self::CatalogBaseUrl => "base_url",
            Self::CatalogEffectsPath => "effects_path",
            Self::CatalogAddonsPath => "addons_path",
            Self::CatalogMirrorPrefix => "mirror_prefix",
            Self::DownloadTimeout => "timeout",
            Self::DownloadProgressIntervalMs => "progress_interval_ms",
            Self::LoggingLevel => "level",
            Self::LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Find the key for a section and key name.
    pub fn lookup(section: &str, key: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.section() == section && k.key_name() == key)
    }

    /// Current value as text; empty when an optional key is unset.
    pub fn get(self, config: &ConfigFile) -> String {
        fn path(p: &Option<PathBuf>) -> String {
            p.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        }

        match self {
            Self::FrameworkStockDir => path(&config.framework.stock_dir),
            Self::FrameworkOpenDir => path(&config.framework.open_dir),
            Self::FrameworkStagingDir => config.framework.staging_dir.to_string_lossy().into_owned(),
            Self::CatalogBaseUrl => config.catalog.base_url.clone(),
            Self::CatalogEffectsPath => config.catalog.effects_path.clone(),
            Self::CatalogAddonsPath => config.catalog.addons_path.clone(),
            Self::CatalogMirrorPrefix => config.catalog.mirror_prefix.clone().unwrap_or_default(),
            Self::DownloadTimeout => config.download.timeout_secs.to_string(),
            Self::DownloadProgressIntervalMs => config.download.progress_interval_ms.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => config.logging.directory.to_string_lossy().into_owned(),
        }
    }

    /// Validate `value` and store it. An empty value clears optional keys.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());
        let required = |v: &str| {
            if v.is_empty() {
                Err(invalid("must not be empty"))
            } else {
                Ok(v.to_string())
            }
        };

        match self {
            Self::FrameworkStockDir => config.framework.stock_dir = optional(value).map(PathBuf::from),
            Self::FrameworkOpenDir => config.framework.open_dir = optional(value).map(PathBuf::from),
            Self::FrameworkStagingDir => config.framework.staging_dir = required(value)?.into(),
            Self::CatalogBaseUrl => {
                let url = reqwest::Url::parse(value).map_err(|e| invalid(&e.to_string()))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(invalid("must be an http or https URL"));
                }
                config.catalog.base_url = value.to_string();
            }
            Self::CatalogEffectsPath => config.catalog.effects_path = required(value)?,
            Self::CatalogAddonsPath => config.catalog.addons_path = required(value)?,
            Self::CatalogMirrorPrefix => config.catalog.mirror_prefix = optional(value),
            Self::DownloadTimeout => config.download.timeout_secs = positive(value, &invalid)?,
            Self::DownloadProgressIntervalMs => {
                config.download.progress_interval_ms = positive(value, &invalid)?
            }
            Self::LoggingLevel => {
                value
                    .parse::<LevelFilter>()
                    .map_err(|_| invalid("expected off, error, warn, info, debug or trace"))?;
                config.logging.level = value.to_ascii_lowercase();
            }
            Self::LoggingDirectory => config.logging.directory = required(value)?.into(),
        }
        Ok(())
    }
}

fn positive(
    value: &str,
    invalid: impl Fn(&str) -> ConfigError,
) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("expected a whole number")),
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once('.')
            .and_then(|(section, key)| Self::lookup(section.trim(), key.trim()))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!(matches!(
            "catalog.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_validates() {
        let mut config = ConfigFile::default();

        assert!(ConfigKey::DownloadTimeout.set(&mut config, "0").is_err());
        assert!(ConfigKey::DownloadTimeout.set(&mut config, "-4").is_err());
        ConfigKey::DownloadTimeout.set(&mut config, " 45 ").unwrap();
        assert_eq!(config.download.timeout_secs, 45);

        assert!(ConfigKey::CatalogBaseUrl.set(&mut config, "ftp://x.test/").is_err());
        assert!(ConfigKey::CatalogEffectsPath.set(&mut config, "").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_clears_optional() {
        let mut config = ConfigFile::default();
        ConfigKey::CatalogMirrorPrefix
            .set(&mut config, "https://proxy.test/")
            .unwrap();
        assert_eq!(ConfigKey::CatalogMirrorPrefix.get(&config), "https://proxy.test/");

        ConfigKey::CatalogMirrorPrefix.set(&mut config, "").unwrap();
        assert_eq!(config.catalog.mirror_prefix, None);
        assert_eq!(ConfigKey::CatalogMirrorPrefix.get(&config), "");
    }
}
