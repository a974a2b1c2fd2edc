//! Configuration for the chime audio engine
//!
//! Minimal TOML bootstrap in the spirit of "only what cannot change while
//! running": storage roots, output device, initial master volume, log
//! level. Everything else is code constants.

use crate::error::{Error, Result};
use crate::storage::MediaPaths;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bootstrap configuration loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Read-only sound asset root.
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Writable user data root; must not overlap the asset root.
    #[serde(default = "default_user_root")]
    pub user_root: PathBuf,

    /// Output device name (None = system default).
    #[serde(default)]
    pub device: Option<String>,

    /// Initial master volume (0.0 to 1.0).
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_user_root() -> PathBuf {
    PathBuf::from("user")
}

fn default_master_volume() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            user_root: default_user_root(),
            device: None,
            master_volume: default_master_volume(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config: EngineConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.master_volume = config.master_volume.clamp(0.0, 1.0);

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Build the asset/user storage layout this configuration describes.
    pub fn media_paths(&self) -> Result<MediaPaths> {
        MediaPaths::new(self.asset_root.clone(), self.user_root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.asset_root, PathBuf::from("assets"));
        assert_eq!(config.user_root, PathBuf::from("user"));
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.device.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            asset_root = "romfs"
            user_root = "sdmc"
            device = "pipewire"
            master_volume = 0.75

            [logging]
            level = "debug"
            "#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.asset_root, PathBuf::from("romfs"));
        assert_eq!(config.user_root, PathBuf::from("sdmc"));
        assert_eq!(config.device.as_deref(), Some("pipewire"));
        assert_eq!(config.master_volume, 0.75);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"asset_root = "data""#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.asset_root, PathBuf::from("data"));
        assert_eq!(config.user_root, PathBuf::from("user"));
        assert_eq!(config.master_volume, 1.0);
    }

    #[test]
    fn test_master_volume_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "master_volume = 3.5").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.master_volume, 1.0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "asset_root = [not toml").unwrap();

        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            EngineConfig::load(Path::new("/nonexistent/chime.toml")),
            Err(Error::Config(_))
        ));
    }
}
