/// Batch upload transport used by the reference queues
use crate::destination::Destination;
use crate::error::TransportError;
use crate::render::Payload;
use async_trait::async_trait;
use tracing::{debug, info};

/// Uploads one batch to a destination.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: &Destination, batch: &[Payload]) -> Result<(), TransportError>;
}

/// Emits every batch as a structured log event instead of uploading it.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, destination: &Destination, batch: &[Payload]) -> Result<(), TransportError> {
        info!(
            destination = %destination.id,
            address = %destination.address,
            events = batch.len(),
            "📦 Uploading batch"
        );
        for payload in batch {
            debug!(
                destination = %destination.id,
                payload = %serde_json::Value::Object(payload.clone()),
                "Batch entry"
            );
        }
        Ok(())
    }
}
