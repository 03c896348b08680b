//! File-backed location provider.

use async_trait::async_trait;
use beacon_core::{Location, LocationError, LocationProvider};
use std::path::PathBuf;
use tracing::debug;

/// Reads the latest fix from a JSON file such as
/// `{"latitude":52.52,"longitude":13.40,"accuracy":12.0}`.
///
/// A missing file means no fix is available yet.
#[derive(Debug, Clone)]
pub struct FileLocationProvider {
    path: PathBuf,
}

impl FileLocationProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocationProvider for FileLocationProvider {
    async fn current(&self) -> Result<Option<Location>, LocationError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No location file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(LocationError::Provider(e.to_string())),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LocationError::Provider(format!("{}: {}", self.path.display(), e)))
    }
}
