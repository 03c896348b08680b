/// Destination fan-out for log and flush actions
use super::worker::{contained, Worker};
use crate::destination::DebugSink;
use crate::error::EngineError;
use crate::render::render;
use crate::segment::Segment;
use std::sync::Arc;
use tracing::{debug, warn};

impl Worker {
    /// Renders `segment` and pushes it onto every destination queue.
    ///
    /// Destinations are attempted in configured order and independently; a
    /// failing destination is logged and skipped. The action succeeds once
    /// every destination has been attempted.
    pub(super) async fn handle_log(&mut self, segment: Segment) -> Result<(), EngineError> {
        let Some(active) = self.active.as_ref().filter(|_| self.is_ready()) else {
            debug!("Rejecting {} '{}': engine not ready", segment.kind(), segment.name());
            return self.reject_not_ready().await;
        };
        if !self.is_enabled() {
            debug!("Analytics disabled, dropping {} '{}'", segment.kind(), segment.name());
            return Ok(());
        }

        let mut delivered = 0u64;
        let mut failed = 0u64;

        for (destination, queue) in active.destinations.iter() {
            let outcome = match render(&segment, &active.context) {
                Ok(payload) => match contained(queue.push(payload)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(panic) => Err(panic),
                },
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    failed += 1;
                    warn!(
                        destination = %destination.id,
                        event = %segment.name(),
                        "⚠️ Delivery failed: {}",
                        reason
                    );
                }
            }
        }

        let mut stats = self.shared.stats.write().await;
        stats.events_logged += 1;
        stats.deliveries += delivered;
        stats.delivery_failures += failed;
        Ok(())
    }

    /// Flushes every destination queue, last configured destination first.
    ///
    /// Flushing while disabled or not ready is a successful no-op. Individual
    /// flush failures are logged and do not stop the remaining destinations.
    pub(super) async fn handle_flush(&mut self, sink: Option<Arc<dyn DebugSink>>) -> Result<(), EngineError> {
        let active = match self.active.as_ref() {
            Some(active) if self.is_ready() && self.is_enabled() => active,
            _ => {
                debug!("Flush skipped: engine disabled or not ready");
                return Ok(());
            }
        };

        let mut flushed = 0u64;
        let mut failed = 0u64;

        for (destination, queue) in active.destinations.iter().rev() {
            let outcome = match contained(queue.flush(sink.clone())).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => Err(panic),
            };

            match outcome {
                Ok(()) => flushed += 1,
                Err(reason) => {
                    failed += 1;
                    warn!(destination = %destination.id, "⚠️ Flush failed: {}", reason);
                }
            }
        }

        let mut stats = self.shared.stats.write().await;
        stats.flushes += flushed;
        stats.flush_failures += failed;
        Ok(())
    }
}
