//! Remote configuration retrieved at the start of every setup.

use crate::error::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

fn default_batch_size() -> usize {
    20
}

fn default_max_queue_length() -> usize {
    1000
}

/// Settings handed to every destination queue built by a setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Maximum payloads per uploaded batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upper bound on buffered payloads per destination; oldest are dropped.
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_queue_length: default_max_queue_length(),
        }
    }
}

/// Source of the remote configuration used during setup.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<RemoteConfig, ConfigError>;
}

/// Always yields the same configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    config: RemoteConfig,
}

impl StaticConfigSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch(&self) -> Result<RemoteConfig, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Reads the configuration from a JSON document on every fetch.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> Result<RemoteConfig, ConfigError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let config: RemoteConfig = serde_json::from_str(&content)?;
        if config.batch_size == 0 {
            return Err(ConfigError::Unavailable(format!(
                "{}: batch_size must be greater than zero",
                self.path.display()
            )));
        }
        debug!("Fetched remote config from {}: {:?}", self.path.display(), config);
        Ok(config)
    }
}
