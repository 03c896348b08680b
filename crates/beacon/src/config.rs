//! Configuration management for the beacon forwarder.
//!
//! This module handles loading, validation, and conversion of forwarder
//! configuration from TOML files and command-line arguments.

use beacon_core::{ConfigSource, Destination, FileConfigSource, RemoteConfig, StaticConfigSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

fn default_batch_size() -> usize {
    RemoteConfig::default().batch_size
}

fn default_max_queue_length() -> usize {
    RemoteConfig::default().max_queue_length
}

fn default_journal_dir() -> String {
    "beacon-queues".to_string()
}

fn default_location_interval() -> u64 {
    beacon_core::location::DEFAULT_INTERVAL_MS
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine and queue settings
    pub engine: EngineSettings,
    /// Collection endpoints, in fan-out order
    pub destinations: Vec<DestinationSettings>,
    /// Location polling settings
    #[serde(default)]
    pub location: LocationSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Engine-level settings.
///
/// `batch_size` and `max_queue_length` are served as the remote config unless
/// `remote_config` points at a JSON document to fetch them from instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Start with analytics enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Stamped onto every payload as `orgId`
    #[serde(default)]
    pub org_id: Option<String>,
    /// Directory holding one journal file per destination
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,
    /// Optional JSON remote-config document
    #[serde(default)]
    pub remote_config: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSettings {
    pub id: String,
    pub address: String,
}

/// Location polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Poll interval in milliseconds
    #[serde(default = "default_location_interval")]
    pub interval_ms: u64,
    /// JSON file holding the latest fix
    #[serde(default = "default_location_file")]
    pub file: String,
}

fn default_location_file() -> String {
    "location.json".to_string()
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_location_interval(),
            file: default_location_file(),
        }
    }
}

/// Logging system configuration.
///
/// Controls log output format and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings {
                enabled: true,
                org_id: None,
                journal_dir: default_journal_dir(),
                batch_size: default_batch_size(),
                max_queue_length: default_max_queue_length(),
                remote_config: None,
            },
            destinations: vec![DestinationSettings {
                id: "primary".to_string(),
                address: "https://collect.example.com/v1/batch".to_string(),
            }],
            location: LocationSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Destinations in configured order.
    pub fn destinations(&self) -> Vec<Destination> {
        self.destinations
            .iter()
            .map(|d| Destination::new(d.id.clone(), d.address.clone()))
            .collect()
    }

    /// The config source handed to every setup.
    pub fn config_source(&self) -> Arc<dyn ConfigSource> {
        match &self.engine.remote_config {
            Some(path) => Arc::new(FileConfigSource::new(PathBuf::from(path))),
            None => Arc::new(StaticConfigSource::new(RemoteConfig {
                batch_size: self.engine.batch_size,
                max_queue_length: self.engine.max_queue_length,
            })),
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.destinations.is_empty() {
            return Err("At least one destination must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for destination in &self.destinations {
            if destination.id.trim().is_empty() {
                return Err("Destination id cannot be empty".to_string());
            }
            if destination.address.trim().is_empty() {
                return Err(format!("Destination '{}' has an empty address", destination.id));
            }
            if !seen.insert(destination.id.as_str()) {
                return Err(format!("Duplicate destination id: {}", destination.id));
            }
        }

        if self.engine.batch_size == 0 {
            return Err("Engine batch_size must be greater than zero".to_string());
        }
        if self.engine.max_queue_length == 0 {
            return Err("Engine max_queue_length must be greater than zero".to_string());
        }
        if self.engine.journal_dir.is_empty() {
            return Err("Journal directory cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert!(config.engine.enabled);
        assert_eq!(config.engine.batch_size, 20);
        assert_eq!(config.engine.max_queue_length, 1000);
        assert_eq!(config.engine.journal_dir, "beacon-queues");
        assert_eq!(config.destinations.len(), 1);
        assert!(!config.location.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config.destinations[0].id, "primary");
        assert!(path.exists());
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.destinations[0].address, config.destinations[0].address);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[engine]
org_id = "org-9"
journal_dir = "/var/lib/beacon"
batch_size = 50

[[destinations]]
id = "eu"
address = "https://eu.collect.example/v1/batch"

[[destinations]]
id = "us"
address = "https://us.collect.example/v1/batch"

[location]
enabled = true
interval_ms = 5000

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert!(config.engine.enabled);
        assert_eq!(config.engine.org_id.as_deref(), Some("org-9"));
        assert_eq!(config.engine.batch_size, 50);
        assert_eq!(config.engine.max_queue_length, 1000);
        let ids: Vec<String> = config.destinations().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["eu", "us"]);
        assert!(config.location.enabled);
        assert_eq!(config.location.interval_ms, 5000);
        assert_eq!(config.location.file, "location.json");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[engine\nbatch_size = ").await.unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_destinations() {
        let mut config = AppConfig::default();
        config.destinations.clear();
        assert!(config.validate().unwrap_err().contains("At least one destination"));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut config = AppConfig::default();
        config.destinations.push(config.destinations[0].clone());
        assert!(config.validate().unwrap_err().contains("Duplicate destination id"));
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut config = AppConfig::default();
        config.destinations[0].id = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.destinations[0].address = String::new();
        assert!(config.validate().unwrap_err().contains("empty address"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = AppConfig::default();
        config.engine.batch_size = 0;
        assert!(config.validate().unwrap_err().contains("batch_size"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));
    }

    #[tokio::test]
    async fn test_static_config_source_uses_engine_settings() {
        let mut config = AppConfig::default();
        config.engine.batch_size = 7;
        config.engine.max_queue_length = 70;

        let remote = config.config_source().fetch().await.unwrap();
        assert_eq!(remote.batch_size, 7);
        assert_eq!(remote.max_queue_length, 70);
    }
}
