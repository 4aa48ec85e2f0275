//! Configuration management for tph-sync
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::geomath::DistanceMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL returning the JSON array of TPH records
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// HTTP settings for sync
    #[serde(default)]
    pub sync: SyncConfig,

    /// Geofence settings
    #[serde(default)]
    pub geofence: GeofenceConfig,

    /// Output settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// HTTP settings for sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Longest wait for any single read, in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Optional cap on the whole request, in seconds. Unset means a steady
    /// but slow download may take as long as it needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_timeout_secs: Option<u64>,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Geofence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Radius in meters; a position at exactly this distance is inside
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,

    /// `haversine` (built in) or `library` (geo crate)
    #[serde(default = "default_distance_method")]
    pub distance_method: DistanceMethod,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Rows shown by `tph list`
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            sync: SyncConfig::default(),
            geofence: GeofenceConfig::default(),
            display: DisplayConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            radius_m: default_radius_m(),
            distance_method: default_distance_method(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.tph)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tph")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn paths_for(config_path: &Path) -> PathsConfig {
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("tph.db"),
            base_dir: base,
        }
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.paths = Self::paths_for(config_path);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    /// when no config file exists there
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        let config_path = base.join("config.toml");

        if config_path.exists() {
            return Self::load(&config_path);
        }

        debug!("No config file found, using defaults");
        let mut config = Config::default();
        config.paths = Self::paths_for(&config_path);
        Ok(config)
    }

    /// Defaults rooted at `config_path`, used by `init`
    pub fn at(config_path: &Path) -> Self {
        let mut config = Config::default();
        config.paths = Self::paths_for(config_path);
        config
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!(
                "endpoint_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.sync.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "sync.connect_timeout_secs must be positive".to_string(),
            ));
        }

        if self.sync.read_timeout_secs == 0 {
            return Err(Error::Config(
                "sync.read_timeout_secs must be positive".to_string(),
            ));
        }

        if self.sync.total_timeout_secs == Some(0) {
            return Err(Error::Config(
                "sync.total_timeout_secs must be positive when set".to_string(),
            ));
        }

        if !self.geofence.radius_m.is_finite() || self.geofence.radius_m <= 0.0 {
            return Err(Error::Config(
                "geofence.radius_m must be a positive number".to_string(),
            ));
        }

        if self.display.list_limit == 0 {
            return Err(Error::Config(
                "display.list_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.connect_timeout_secs, 15);
        assert_eq!(config.sync.read_timeout_secs, 30);
        assert_eq!(config.geofence.radius_m, 30.0);
        assert_eq!(config.geofence.distance_method, DistanceMethod::Haversine);
        assert_eq!(config.display.list_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::at(&tmp.path().join("config.toml"));
        config.endpoint_url = "http://127.0.0.1:8080/api/data".to_string();
        config.geofence.radius_m = 20.0;
        config.geofence.distance_method = DistanceMethod::Library;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.endpoint_url, "http://127.0.0.1:8080/api/data");
        assert_eq!(loaded.geofence.radius_m, 20.0);
        assert_eq!(loaded.geofence.distance_method, DistanceMethod::Library);
        assert_eq!(loaded.paths.db_file, tmp.path().join("tph.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "endpoint_url = \"https://example.com/tph\"\n[geofence]\nradius_m = 20.0\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.geofence.radius_m, 20.0);
        assert_eq!(config.sync.read_timeout_secs, 30);
        assert_eq!(config.display.list_limit, 50);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.geofence.radius_m = 0.0;
        assert!(config.validate().is_err());
        config.geofence.radius_m = 20.0;
        assert!(config.validate().is_ok());

        config.sync.read_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.sync.read_timeout_secs = 30;

        config.sync.total_timeout_secs = Some(0);
        assert!(config.validate().is_err());
        config.sync.total_timeout_secs = Some(120);
        assert!(config.validate().is_ok());
        config.sync.total_timeout_secs = None;

        config.endpoint_url = "ftp://example.com/data".to_string();
        assert!(config.validate().is_err());
        config.endpoint_url = "not a url".to_string();
        assert!(config.validate().is_err());
        config.endpoint_url = "https://example.com/data".to_string();

        config.display.list_limit = 0;
        assert!(config.validate().is_err());
    }
}
