//! Configuration management for Shiori.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Shiori";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream site and transport settings.
    pub source: SourceConfig,

    /// Search engine tuning.
    pub search: SearchConfig,
}

/// Upstream site and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Site root, without trailing slash.
    pub base_url: String,

    /// Delay before each web request in seconds.
    pub delay_between_requests_sec: f64,

    /// Per-request timeout in seconds.
    pub timeout_sec: u64,

    /// Enable debug logging.
    pub debug: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://atsu.moe".to_string(),
            delay_between_requests_sec: 0.0,
            timeout_sec: 30,
            debug: false,
        }
    }
}

/// Search engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when the caller doesn't ask for one.
    pub default_per_page: u32,

    /// Smallest page size sent upstream.
    pub min_per_page: u32,

    /// Largest page size sent upstream.
    pub max_per_page: u32,

    /// Extra attempts when page 1 comes back empty.
    pub transient_retries: u32,

    /// Keep the last query's results around.
    pub cache_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: 24,
            min_per_page: 12,
            max_per_page: 48,
            transient_retries: 2,
            cache_enabled: true,
        }
    }
}

impl SearchConfig {
    /// Clamps a requested page size into the configured range.
    pub fn clamp_per_page(&self, requested: Option<u32>) -> u32 {
        requested
            .filter(|&n| n > 0)
            .unwrap_or(self.default_per_page)
            .clamp(self.min_per_page, self.max_per_page)
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("source.base_url".to_string()));
        }

        if url::Url::parse(&self.source.base_url).is_err() {
            return Err(invalid("source.base_url", "must be an absolute URL"));
        }

        if self.source.timeout_sec == 0 {
            return Err(invalid("source.timeout_sec", "must be greater than 0"));
        }

        let search = &self.search;
        if search.min_per_page == 0 {
            return Err(invalid("search.min_per_page", "must be greater than 0"));
        }
        if search.min_per_page > search.max_per_page {
            return Err(invalid(
                "search.min_per_page",
                "must not exceed search.max_per_page",
            ));
        }
        if !(search.min_per_page..=search.max_per_page).contains(&search.default_per_page) {
            return Err(invalid(
                "search.default_per_page",
                "must lie between min_per_page and max_per_page",
            ));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.base_url, "https://atsu.moe");
        assert_eq!(config.search.default_per_page, 24);
        assert_eq!(config.search.transient_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.search.max_per_page = 40;
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.search.max_per_page, 40);
        assert_eq!(loaded.source.base_url, config.source.base_url);
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.min_per_page, 12);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[search]\ntransient_retries = 5\n").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.search.transient_retries, 5);
        assert_eq!(config.search.default_per_page, 24);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.search.min_per_page = 50;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.default_per_page = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.timeout_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_base_url_is_missing() {
        let mut config = Config::default();
        config.source.base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue(key)) if key == "source.base_url"
        ));
    }

    #[test]
    fn test_clamp_per_page() {
        let search = SearchConfig::default();
        assert_eq!(search.clamp_per_page(None), 24);
        assert_eq!(search.clamp_per_page(Some(0)), 24);
        assert_eq!(search.clamp_per_page(Some(5)), 12);
        assert_eq!(search.clamp_per_page(Some(20)), 20);
        assert_eq!(search.clamp_per_page(Some(500)), 48);
    }
}
