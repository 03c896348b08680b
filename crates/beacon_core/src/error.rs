//! Error types for the analytics pipeline.
//!
//! Only [`EngineError`] is ever handed back to callers of the facade. The
//! remaining enums describe failures of individual collaborators; they are
//! either wrapped into [`SetupError`] (during setup) or logged and counted
//! where they occur (during fan-out and flush).

/// Errors surfaced through an action's completion handle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A log action was processed before any setup succeeded. Flush
    /// resolves `Ok` in that state instead.
    #[error("engine not ready")]
    NotReady,
    /// The setup action failed; the engine is not ready.
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),
    /// The processing loop is gone and the action was never resolved.
    #[error("engine stopped")]
    Stopped,
}

impl EngineError {
    /// Returns true for the not-ready gate error.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, EngineError::NotReady)
    }
}

/// Failure while building a destination set.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The configuration source could not produce a remote config.
    #[error("config fetch failed: {0}")]
    Config(#[from] ConfigError),
    /// A destination queue could not be opened or never became ready.
    #[error("queue for destination '{destination}' failed: {source}")]
    Queue {
        destination: String,
        #[source]
        source: QueueError,
    },
}

/// Errors raised by a configuration source.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config source unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a durable destination queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Queue encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Queue not ready: {0}")]
    NotReady(String),
    #[error("Queue rejected payload: {0}")]
    Rejected(String),
}

/// Errors raised by a batch transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Delivery to {destination} failed: {reason}")]
    Delivery { destination: String, reason: String },
}

/// Errors raised while rendering a segment into a payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("{0} must not be blank")]
    BlankIdentifier(&'static str),
    #[error("Property keys must not be blank")]
    BlankKey,
    #[error("Property nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Errors raised by a location provider.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location provider failed: {0}")]
    Provider(String),
}
