use super::QueueSettings;
use crate::destination::{DebugSink, DestinationQueue};
use crate::error::QueueError;
use crate::render::Payload;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

type Buffer = Arc<Mutex<VecDeque<Payload>>>;

/// Buffers keyed by destination id.
///
/// A re-setup opens fresh queue handles, but handles for the same
/// destination id share one buffer, so nothing buffered is lost.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buffers: Arc<Mutex<HashMap<String, Buffer>>>,
}

impl MemoryStore {
    pub(crate) async fn buffer_for(&self, destination_id: &str) -> Buffer {
        let mut buffers = self.buffers.lock().await;
        buffers
            .entry(destination_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}

/// In-process destination queue.
pub struct MemoryQueue {
    buffer: Buffer,
    settings: QueueSettings,
}

impl MemoryQueue {
    pub(crate) fn new(buffer: Buffer, settings: QueueSettings) -> Self {
        Self { buffer, settings }
    }
}

#[async_trait]
impl DestinationQueue for MemoryQueue {
    async fn push(&self, payload: Payload) -> Result<(), QueueError> {
        let mut buffer = self.buffer.lock().await;
        self.settings.enqueue_bounded(&mut buffer, payload);
        Ok(())
    }

    async fn flush(&self, sink: Option<Arc<dyn DebugSink>>) -> Result<(), QueueError> {
        let mut buffer = self.buffer.lock().await;
        self.settings.drain(&mut buffer, sink).await.map(|_| ())
    }

    async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }
}
