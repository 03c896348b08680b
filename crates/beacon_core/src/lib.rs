//! # Beacon Core
//!
//! An ordered, readiness-gated analytics pipeline. Events are rendered once
//! per destination and handed to durable per-destination queues, which own
//! batching and upload.
//!
//! ## Core Features
//!
//! - **Strict Ordering**: every setup, log and flush call is queued at call time
//!   and processed one at a time, in call order
//! - **Readiness Gate**: data calls made before a successful setup fail with
//!   [`EngineError::NotReady`] when processed, never eagerly
//! - **Failure Isolation**: a failing or panicking destination is logged and
//!   skipped without affecting its siblings
//! - **Lifecycle Aware**: host pause flushes queues, host resume re-applies setup
//! - **Statistics**: built-in counters via [`Analytics::stats`]
//!
//! ## Architecture Overview
//!
//! ### Engine (`engine`)
//! A single consumer task drains the action queue. It owns the staged setup
//! parameters and the active destination set; nothing else mutates them.
//!
//! ### Destinations (`destination`, `queues`)
//! [`QueueFactory`] builds one [`DestinationQueue`] per destination during
//! setup. [`StandardQueueFactory`] provides in-memory and journal-file queues.
//!
//! ### Lifecycle (`lifecycle`, `location`)
//! [`LifecycleMonitor`] fans host state changes out to the engine bridge and
//! to the optional [`LocationPoller`].
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use beacon_core::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analytics = Analytics::new(Arc::new(StandardQueueFactory::journal("./beacon-queues")));
//!
//!     let config = Arc::new(StaticConfigSource::new(RemoteConfig::default()));
//!     let destinations = vec![Destination::new("primary", "https://collect.example/v1/batch")];
//!
//!     // Not awaited: the track below is still processed after setup.
//!     let _ = analytics.setup(SetupParams::new(config, destinations));
//!     analytics.track("Signed Up", None).await?;
//!
//!     analytics.flush(None).await?;
//!     analytics.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config_source;
pub mod destination;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod location;
pub mod queues;
pub mod render;
pub mod segment;
pub mod stats;

pub use analytics::Analytics;
pub use config_source::{ConfigSource, FileConfigSource, RemoteConfig, StaticConfigSource};
pub use destination::{DebugSink, Destination, DestinationQueue, DestinationSet, QueueFactory};
pub use engine::{ActionKind, Completion, Engine, EngineHandle, SetupParams};
pub use error::{ConfigError, EngineError, LocationError, QueueError, RenderError, SetupError, TransportError};
pub use lifecycle::{LifecycleBridge, LifecycleMonitor, LifecycleState};
pub use location::{Location, LocationPoller, LocationProvider, PollerState};
pub use queues::{JournalQueue, LogTransport, MemoryQueue, MemoryStore, QueueKind, StandardQueueFactory, Transport};
pub use render::{render, Payload, RenderContext};
pub use segment::{Properties, Segment};
pub use stats::EngineStats;
