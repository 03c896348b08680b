/// Engine statistics for monitoring
use serde::{Deserialize, Serialize};

/// Counters maintained by the processing loop.
///
/// Only the loop writes these; readers get a cloned snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Actions fully processed, whatever their outcome
    pub actions_processed: u64,
    /// Log actions that reached fan-out
    pub events_logged: u64,
    /// Payloads accepted by a destination queue
    pub deliveries: u64,
    /// Per-destination render or push failures
    pub delivery_failures: u64,
    /// Per-destination flushes that completed
    pub flushes: u64,
    /// Per-destination flushes that failed
    pub flush_failures: u64,
    pub setups_succeeded: u64,
    pub setups_failed: u64,
    /// Log actions resolved with the not-ready error
    pub not_ready_rejections: u64,
}
