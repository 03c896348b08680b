/// Queued units of work and their completion handles
use super::SetupParams;
use crate::destination::DebugSink;
use crate::error::EngineError;
use crate::segment::Segment;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Discriminant of an [`Action`], used for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Setup,
    Log,
    Flush,
}

/// A unit of work for the processing loop.
///
/// Every action is consumed exactly once, and its resolver is resolved
/// exactly once, by the loop.
pub(crate) enum Action {
    /// `None` re-applies the parameters staged by an earlier setup.
    Setup {
        params: Option<SetupParams>,
        done: Resolver,
    },
    Log {
        segment: Segment,
        done: Resolver,
    },
    Flush {
        sink: Option<Arc<dyn DebugSink>>,
        done: Resolver,
    },
}

impl Action {
    pub(crate) fn kind(&self) -> ActionKind {
        match self {
            Action::Setup { .. } => ActionKind::Setup,
            Action::Log { .. } => ActionKind::Log,
            Action::Flush { .. } => ActionKind::Flush,
        }
    }
}

/// Consumer side of a completion handle.
pub(crate) struct Resolver(oneshot::Sender<Result<(), EngineError>>);

impl Resolver {
    pub(crate) fn resolve(self, result: Result<(), EngineError>) {
        // The caller may have dropped its handle; the result is then unobserved.
        let _ = self.0.send(result);
    }
}

/// Resolves once the action behind it has been fully processed.
///
/// The action is already queued when this handle is returned, so dropping
/// it without awaiting does not cancel anything.
#[must_use = "the action is queued either way; await the handle to observe its outcome"]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), EngineError>>,
}

impl Future for Completion {
    type Output = Result<(), EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EngineError::Stopped)))
    }
}

pub(crate) fn completion_pair() -> (Resolver, Completion) {
    let (tx, rx) = oneshot::channel();
    (Resolver(tx), Completion { rx })
}
