//! Public entry point.

use crate::destination::{DebugSink, QueueFactory};
use crate::engine::{Completion, Engine, EngineHandle, SetupParams};
use crate::lifecycle::{LifecycleBridge, LifecycleMonitor, LifecycleState};
use crate::location::{LocationPoller, LocationProvider};
use crate::segment::{Properties, Segment};
use crate::stats::EngineStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Analytics facade.
///
/// Every data call is queued immediately and returns a [`Completion`]. Calls
/// are processed strictly in call order, so a `track` issued right after an
/// unawaited `setup` behaves as if the setup had already finished.
///
/// ```no_run
/// # async fn demo() -> Result<(), beacon_core::EngineError> {
/// use beacon_core::{Analytics, Destination, SetupParams, StandardQueueFactory, StaticConfigSource};
/// use std::sync::Arc;
///
/// let analytics = Analytics::new(Arc::new(StandardQueueFactory::in_memory()));
/// let config = Arc::new(StaticConfigSource::new(Default::default()));
/// let _ = analytics.setup(SetupParams::new(config, vec![Destination::new("main", "https://collect.example/v1")]));
/// analytics.track("App Opened", None).await?;
/// analytics.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Analytics {
    engine: Engine,
    lifecycle: LifecycleMonitor,
}

impl Analytics {
    /// Spawns the engine and wires the lifecycle bridge to it.
    pub fn new(factory: Arc<dyn QueueFactory>) -> Self {
        let engine = Engine::spawn(factory);
        let lifecycle = LifecycleMonitor::new();
        LifecycleBridge::attach(&lifecycle, engine.handle());
        info!("📈 Analytics initialized");
        Self { engine, lifecycle }
    }

    pub fn setup(&self, params: SetupParams) -> Completion {
        self.engine.handle().setup(params)
    }

    pub fn group(&self, group_id: impl Into<String>, traits: Option<Properties>) -> Completion {
        self.log(Segment::group(group_id, traits))
    }

    pub fn identify(&self, user_id: impl Into<String>, traits: Option<Properties>) -> Completion {
        self.log(Segment::identify(user_id, traits))
    }

    pub fn screen(&self, name: impl Into<String>, properties: Option<Properties>) -> Completion {
        self.log(Segment::screen(name, properties))
    }

    pub fn track(&self, event: impl Into<String>, properties: Option<Properties>) -> Completion {
        self.log(Segment::track(event, properties))
    }

    /// Queues an already-built segment.
    pub fn log(&self, segment: Segment) -> Completion {
        self.engine.handle().log(segment)
    }

    /// Flushes every destination queue, optionally into `sink` instead of the
    /// configured transport.
    pub fn flush(&self, sink: Option<Arc<dyn DebugSink>>) -> Completion {
        self.engine.handle().flush(sink)
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.handle().is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        info!("Analytics {}", if enabled { "enabled" } else { "disabled" });
        self.engine.handle().set_enabled(enabled)
    }

    pub fn is_ready(&self) -> bool {
        self.engine.handle().is_ready()
    }

    /// Reports a host lifecycle state. `None` stands for an unknown state.
    pub fn update_lifecycle_state(&self, state: Option<LifecycleState>) -> bool {
        self.lifecycle.update(state)
    }

    pub fn lifecycle(&self) -> &LifecycleMonitor {
        &self.lifecycle
    }

    pub fn handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    /// Builds a location poller that tracks through this instance and
    /// follows its lifecycle. The poller is returned unstarted.
    pub fn location_poller(&self, provider: Arc<dyn LocationProvider>, interval: Duration) -> Arc<LocationPoller> {
        let poller = Arc::new(LocationPoller::new(provider, self.engine.handle(), interval));
        poller.attach(&self.lifecycle);
        poller
    }

    pub async fn stats(&self) -> EngineStats {
        self.engine.handle().stats().await
    }

    /// Processes every action queued so far, then stops the engine.
    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}
