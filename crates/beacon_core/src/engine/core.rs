/// Engine construction and the handle callers enqueue through
use super::action::{completion_pair, Action, Completion};
use super::worker::Worker;
use crate::config_source::ConfigSource;
use crate::destination::{DebugSink, Destination, QueueFactory};
use crate::segment::Segment;
use crate::stats::EngineStats;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Parameters staged by a setup call.
#[derive(Clone)]
pub struct SetupParams {
    /// Where the remote configuration is fetched from.
    pub config_source: Arc<dyn ConfigSource>,
    /// Destinations in fan-out order.
    pub destinations: Vec<Destination>,
    /// Delivered to instead of the transport on every flush without a
    /// per-call sink.
    pub flush_callback: Option<Arc<dyn DebugSink>>,
    /// Stamped onto every rendered payload as `orgId`.
    pub org_id: Option<String>,
}

impl SetupParams {
    pub fn new(config_source: Arc<dyn ConfigSource>, destinations: Vec<Destination>) -> Self {
        Self {
            config_source,
            destinations,
            flush_callback: None,
            org_id: None,
        }
    }

    pub fn with_flush_callback(mut self, callback: Arc<dyn DebugSink>) -> Self {
        self.flush_callback = Some(callback);
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

impl fmt::Debug for SetupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupParams")
            .field("destinations", &self.destinations)
            .field("flush_callback", &self.flush_callback.is_some())
            .field("org_id", &self.org_id)
            .finish()
    }
}

/// State shared between the handles and the processing loop.
///
/// `ready` and `stats` are written only by the loop.
#[derive(Debug)]
pub(crate) struct EngineShared {
    pub(crate) enabled: AtomicBool,
    pub(crate) ready: AtomicBool,
    pub(crate) stats: RwLock<EngineStats>,
}

impl EngineShared {
    pub(crate) fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            ready: AtomicBool::new(false),
            stats: RwLock::new(EngineStats::default()),
        }
    }
}

/// Cheap, cloneable entry point into the action queue.
///
/// Every method pushes one action and returns immediately; pushes from any
/// number of tasks are processed strictly in the order they were made.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Action>,
    shared: Arc<EngineShared>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("ready", &self.is_ready())
            .field("enabled", &self.is_enabled())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl EngineHandle {
    pub(crate) fn from_parts(tx: mpsc::UnboundedSender<Action>, shared: Arc<EngineShared>) -> Self {
        Self { tx, shared }
    }

    fn push(&self, action: Action) {
        let kind = action.kind();
        if self.tx.send(action).is_err() {
            // The returned action drops its resolver here, which resolves
            // the caller's handle with `EngineError::Stopped`.
            warn!("Action {:?} pushed after engine shutdown", kind);
        } else {
            debug!("Queued {:?} action", kind);
        }
    }

    /// Stages `params` and queues a setup action.
    pub fn setup(&self, params: SetupParams) -> Completion {
        let (done, completion) = completion_pair();
        self.push(Action::Setup {
            params: Some(params),
            done,
        });
        completion
    }

    /// Queues a setup action that re-applies the last staged parameters.
    ///
    /// Resolves successfully without doing anything if nothing was ever staged.
    pub fn reapply_setup(&self) -> Completion {
        let (done, completion) = completion_pair();
        self.push(Action::Setup { params: None, done });
        completion
    }

    /// Queues a log action for `segment`.
    pub fn log(&self, segment: Segment) -> Completion {
        let (done, completion) = completion_pair();
        self.push(Action::Log { segment, done });
        completion
    }

    /// Queues a flush of every destination queue.
    pub fn flush(&self, sink: Option<Arc<dyn DebugSink>>) -> Completion {
        let (done, completion) = completion_pair();
        self.push(Action::Flush { sink, done });
        completion
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Global bypass switch, consulted when each log/flush action is processed.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    pub async fn stats(&self) -> EngineStats {
        self.shared.stats.read().await.clone()
    }
}

/// Owner of the processing loop.
///
/// Exactly one loop task exists per engine. Dropping the engine lets the
/// loop finish the actions already queued and then exit.
pub struct Engine {
    handle: EngineHandle,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Spawns the processing loop on the current tokio runtime.
    pub fn spawn(factory: Arc<dyn QueueFactory>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::new(EngineShared::new());

        let worker = Worker::new(shared.clone(), factory);
        let task = tokio::spawn(worker.run(rx, shutdown_rx));

        Self {
            handle: EngineHandle::from_parts(tx, shared),
            shutdown: Some(shutdown_tx),
            worker: Some(task),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stops accepting actions, drains what is queued and waits for the loop.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Engine loop ended abnormally: {}", e);
            }
        }
        info!("🛑 Engine stopped");
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("handle", &self.handle)
            .field("running", &self.worker.is_some())
            .finish()
    }
}
