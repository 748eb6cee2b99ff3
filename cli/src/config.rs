// Configuration management for the beacons CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/beacons/config.json
// - Linux: ~/.config/beacons/config.json
// - Windows: %APPDATA%\beacons\config.json

use anyhow::{Context, Result};
use beacons_core::BeaconsConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings handed to the beacon plugin
    pub beacons: BeaconsConfig,

    /// How long `scan` listens when no duration is given
    pub scan_seconds: u64,

    /// Beacon UUID used by `encode`/`advertise` when none is given
    pub default_uuid: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            beacons: BeaconsConfig::default(),
            scan_seconds: 10,
            default_uuid: None,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("beacons");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            config
                .beacons
                .validate()
                .context("Config file holds invalid beacon settings")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value in memory; the caller persists it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "log_filter" => {
                self.beacons.log_filter = value.to_string();
            }
            "advertise_mode" => {
                self.beacons.advertise.mode = parse_variant(value)?;
            }
            "tx_power" => {
                self.beacons.advertise.tx_power = parse_variant(value)?;
            }
            "advertise_timeout_ms" => {
                self.beacons.advertise.timeout_ms = value.parse().context("Invalid number")?;
            }
            "connectable" => {
                self.beacons.advertise.connectable =
                    value.parse().context("Invalid boolean value")?;
            }
            "scan_mode" => {
                self.beacons.scan.mode = parse_variant(value)?;
            }
            "report_delay_ms" => {
                self.beacons.scan.report_delay_ms = value.parse().context("Invalid number")?;
            }
            "scan_seconds" => {
                self.scan_seconds = value.parse().context("Invalid number")?;
            }
            "default_uuid" => {
                self.default_uuid = if value.is_empty() {
                    None
                } else {
                    uuid::Uuid::parse_str(value).context("Invalid UUID")?;
                    Some(value.to_string())
                };
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.beacons.validate()?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn list(&self) -> Vec<(String, String)> {
        let settings = &self.beacons;
        vec![
            ("log_filter".to_string(), settings.log_filter.clone()),
            ("advertise_mode".to_string(), format!("{:?}", settings.advertise.mode)),
            ("tx_power".to_string(), format!("{:?}", settings.advertise.tx_power)),
            (
                "advertise_timeout_ms".to_string(),
                settings.advertise.timeout_ms.to_string(),
            ),
            (
                "connectable".to_string(),
                settings.advertise.connectable.to_string(),
            ),
            ("scan_mode".to_string(), format!("{:?}", settings.scan.mode)),
            (
                "report_delay_ms".to_string(),
                settings.scan.report_delay_ms.to_string(),
            ),
            ("scan_seconds".to_string(), self.scan_seconds.to_string()),
            (
                "default_uuid".to_string(),
                self.default_uuid
                    .clone()
                    .unwrap_or_else(|| "(none)".to_string()),
            ),
        ]
    }
}

/// Parse an enum variant by name, e.g. `LowLatency`
fn parse_variant<T: DeserializeOwned>(value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Invalid value: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacons_core::{AdvertiseMode, ScanMode};
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan_seconds, 10);
        assert_eq!(config.beacons.log_filter, "info");
        assert!(config.default_uuid.is_none());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("advertise_mode", "Balanced").unwrap();
        config.set("scan_mode", "LowPower").unwrap();
        config.set("scan_seconds", "30").unwrap();

        assert_eq!(config.beacons.advertise.mode, AdvertiseMode::Balanced);
        assert_eq!(config.beacons.scan.mode, ScanMode::LowPower);
        assert_eq!(config.get("scan_seconds").as_deref(), Some("30"));
        assert_eq!(config.get("advertise_mode").as_deref(), Some("Balanced"));
        assert!(config.get("listen_port").is_none());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("tx_power", "Loud").is_err());
        assert!(config.set("default_uuid", "not-a-uuid").is_err());
        assert!(config.set("advertise_timeout_ms", "999999").is_err());
        assert!(config.set("bootstrap", "x").is_err());
    }

    #[test]
    fn test_load_creates_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.scan_seconds, 10);

        let mut config = created;
        config
            .set("default_uuid", "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0")
            .unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.default_uuid.as_deref(),
            Some("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0")
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "scan_seconds": 3 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scan_seconds, 3);
        assert_eq!(config.beacons, BeaconsConfig::default());
    }
}
