//! Reference durable-queue implementations.
//!
//! [`MemoryQueue`] keeps payloads in process (shared per destination through
//! a [`MemoryStore`]), [`JournalQueue`] appends them to a JSON-lines file per
//! destination. Both flush in batches of the remote config's `batch_size`
//! and keep a batch queued when its delivery fails or is not acknowledged.

mod journal;
mod memory;
mod transport;

pub use journal::JournalQueue;
pub use memory::{MemoryQueue, MemoryStore};
pub use transport::{LogTransport, Transport};

use crate::config_source::RemoteConfig;
use crate::destination::{DebugSink, Destination, DestinationQueue, QueueFactory};
use crate::error::QueueError;
use crate::render::Payload;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage backend built by [`StandardQueueFactory`].
#[derive(Debug, Clone)]
pub enum QueueKind {
    /// In-process buffers that survive re-setup but not restarts.
    Memory(MemoryStore),
    /// One journal file per destination inside the given directory.
    Journal(PathBuf),
}

/// Factory for the reference queues.
#[derive(Clone)]
pub struct StandardQueueFactory {
    kind: QueueKind,
    transport: Arc<dyn Transport>,
}

impl StandardQueueFactory {
    pub fn new(kind: QueueKind, transport: Arc<dyn Transport>) -> Self {
        Self { kind, transport }
    }

    /// In-memory queues delivering through [`LogTransport`].
    pub fn in_memory() -> Self {
        Self::new(QueueKind::Memory(MemoryStore::default()), Arc::new(LogTransport))
    }

    /// Journal queues under `dir` delivering through [`LogTransport`].
    pub fn journal(dir: impl Into<PathBuf>) -> Self {
        Self::new(QueueKind::Journal(dir.into()), Arc::new(LogTransport))
    }
}

#[async_trait]
impl QueueFactory for StandardQueueFactory {
    async fn open(
        &self,
        destination: &Destination,
        remote: &RemoteConfig,
        default_sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<Arc<dyn DestinationQueue>, QueueError> {
        let settings = QueueSettings {
            destination: destination.clone(),
            batch_size: remote.batch_size.max(1),
            max_len: remote.max_queue_length.max(1),
            default_sink,
            transport: self.transport.clone(),
        };

        let queue: Arc<dyn DestinationQueue> = match &self.kind {
            QueueKind::Memory(store) => Arc::new(MemoryQueue::new(store.buffer_for(&destination.id).await, settings)),
            QueueKind::Journal(dir) => Arc::new(JournalQueue::open(dir, settings).await?),
        };
        Ok(queue)
    }
}

/// Settings shared by both reference queues.
#[derive(Clone)]
pub(crate) struct QueueSettings {
    pub destination: Destination,
    pub batch_size: usize,
    pub max_len: usize,
    pub default_sink: Option<Arc<dyn DebugSink>>,
    pub transport: Arc<dyn Transport>,
}

impl QueueSettings {
    /// Appends `payload`, dropping the oldest entries beyond `max_len`.
    /// Returns how many entries were dropped.
    pub(crate) fn enqueue_bounded(&self, buffer: &mut VecDeque<Payload>, payload: Payload) -> usize {
        buffer.push_back(payload);
        let mut dropped = 0;
        while buffer.len() > self.max_len {
            buffer.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            warn!(
                destination = %self.destination.id,
                dropped,
                "Queue full, dropped oldest payloads"
            );
        }
        dropped
    }

    /// Delivers `buffer` front-first in batches.
    ///
    /// Delivered batches are removed. The first failed or unacknowledged
    /// batch stops the drain and stays at the front. Returns the number of
    /// payloads removed.
    pub(crate) async fn drain(
        &self,
        buffer: &mut VecDeque<Payload>,
        sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<usize, QueueError> {
        let sink = sink.or_else(|| self.default_sink.clone());
        let mut delivered = 0;

        while !buffer.is_empty() {
            let take = self.batch_size.min(buffer.len());
            let batch: Vec<Payload> = buffer.iter().take(take).cloned().collect();

            match &sink {
                Some(sink) => {
                    if !sink.deliver(&self.destination, &batch).await {
                        debug!(
                            destination = %self.destination.id,
                            "Debug sink did not acknowledge batch, keeping it queued"
                        );
                        break;
                    }
                }
                None => self.transport.send(&self.destination, &batch).await?,
            }

            buffer.drain(..take).for_each(drop);
            delivered += take;
        }

        Ok(delivered)
    }
}
