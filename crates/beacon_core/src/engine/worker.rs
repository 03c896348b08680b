/// The single consumer that drains the action queue
use super::action::Action;
use super::core::{EngineShared, SetupParams};
use crate::destination::{DestinationSet, QueueFactory};
use crate::error::EngineError;
use crate::render::RenderContext;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// The destination set installed by the last successful setup, together
/// with the render context derived from the same parameters.
pub(super) struct ActiveSet {
    pub(super) destinations: DestinationSet,
    pub(super) context: RenderContext,
}

/// Processing-loop state. Owned by the loop task; nothing else touches it.
pub(crate) struct Worker {
    pub(super) shared: Arc<EngineShared>,
    pub(super) factory: Arc<dyn QueueFactory>,
    pub(super) staged: Option<SetupParams>,
    pub(super) active: Option<ActiveSet>,
}

impl Worker {
    pub(crate) fn new(shared: Arc<EngineShared>, factory: Arc<dyn QueueFactory>) -> Self {
        Self {
            shared,
            factory,
            staged: None,
            active: None,
        }
    }

    /// Drains `rx` one action at a time until the channel closes.
    ///
    /// Once `shutdown` fires (or its sender is dropped) the channel is closed
    /// to new pushes and the remaining actions are still processed.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Action>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("🚀 Engine loop started");
        let mut closing = false;

        loop {
            tokio::select! {
                action = rx.recv() => match action {
                    Some(action) => self.process(action).await,
                    None => break,
                },
                _ = &mut shutdown, if !closing => {
                    debug!("Shutdown requested, draining queued actions");
                    closing = true;
                    rx.close();
                }
            }
        }

        info!("Engine loop drained and exiting");
    }

    /// Processes one action completely, including all of its async work,
    /// and resolves its completion handle.
    pub(crate) async fn process(&mut self, action: Action) {
        let kind = action.kind();
        debug!("Processing {:?} action", kind);

        let (result, done) = match action {
            Action::Setup { params, done } => (self.handle_setup(params).await, done),
            Action::Log { segment, done } => (self.handle_log(segment).await, done),
            Action::Flush { sink, done } => (self.handle_flush(sink).await, done),
        };

        // Counted before resolving so a caller awaiting the completion sees it.
        self.shared.stats.write().await.actions_processed += 1;
        done.resolve(result);
    }

    pub(super) fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub(super) async fn reject_not_ready(&self) -> Result<(), EngineError> {
        self.shared.stats.write().await.not_ready_rejections += 1;
        Err(EngineError::NotReady)
    }
}

/// Runs a collaborator future, turning a panic into an error message so a
/// misbehaving destination cannot take the loop down.
pub(super) async fn contained<F: Future>(fut: F) -> Result<F::Output, String> {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|panic| panic_message(&*panic))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
