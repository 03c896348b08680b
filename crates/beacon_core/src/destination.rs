//! Destinations and the durable-queue collaborator interface.
//!
//! The engine never stores or uploads anything itself. Each configured
//! [`Destination`] is paired with a [`DestinationQueue`] built by a
//! [`QueueFactory`]; the queue owns persistence, batching and upload.

use crate::config_source::RemoteConfig;
use crate::error::QueueError;
use crate::render::Payload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A remote collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Stable identifier, used for queue storage naming and logging.
    pub id: String,
    /// Address batches are uploaded to.
    pub address: String,
}

impl Destination {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address)
    }
}

/// Receives pending batches in place of the real transport.
///
/// Returning `true` acknowledges the batch, which lets the queue dequeue it.
#[async_trait]
pub trait DebugSink: Send + Sync {
    async fn deliver(&self, destination: &Destination, batch: &[Payload]) -> bool;
}

/// A persistence-backed buffer for a single destination.
#[async_trait]
pub trait DestinationQueue: Send + Sync {
    /// Appends one rendered payload.
    async fn push(&self, payload: Payload) -> Result<(), QueueError>;

    /// Uploads pending batches, or hands them to `sink` when one is given.
    async fn flush(&self, sink: Option<Arc<dyn DebugSink>>) -> Result<(), QueueError>;

    /// Resolves once the queue can accept pushes.
    async fn wait_ready(&self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Number of payloads currently buffered.
    async fn len(&self) -> usize;
}

/// Builds the queue for a destination during setup.
#[async_trait]
pub trait QueueFactory: Send + Sync {
    /// Opens the durable queue for `destination`.
    ///
    /// `default_sink` is the setup-level flush callback; when present the
    /// queue delivers to it instead of its transport unless a flush call
    /// supplies its own sink.
    async fn open(
        &self,
        destination: &Destination,
        remote: &RemoteConfig,
        default_sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<Arc<dyn DestinationQueue>, QueueError>;
}

/// The ordered destination/queue pairs produced by one successful setup.
///
/// A set is built completely before it is installed and never edited
/// afterwards, so fan-out always works on one consistent snapshot.
#[derive(Clone)]
pub struct DestinationSet {
    entries: Vec<(Destination, Arc<dyn DestinationQueue>)>,
}

impl DestinationSet {
    pub(crate) fn new(entries: Vec<(Destination, Arc<dyn DestinationQueue>)>) -> Self {
        Self { entries }
    }

    /// Destinations in configured order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &(Destination, Arc<dyn DestinationQueue>)> {
        self.entries.iter()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.entries.iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DestinationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationSet")
            .field("destinations", &self.destinations())
            .finish()
    }
}
