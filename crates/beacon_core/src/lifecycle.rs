//! Host lifecycle observation and its effect on the engine.
//!
//! [`LifecycleMonitor`] holds the last known host state and notifies its
//! subscribers, synchronously and in registration order, whenever the state
//! actually changes. [`LifecycleBridge`] is the subscriber that turns
//! `Paused` into a flush and `Resumed` into a re-applied setup.

use crate::engine::EngineHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Host application lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Resumed,
    Inactive,
    Paused,
    Hidden,
    Detached,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Resumed => "resumed",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Paused => "paused",
            LifecycleState::Hidden => "hidden",
            LifecycleState::Detached => "detached",
        };
        f.write_str(name)
    }
}

impl LifecycleState {
    /// Parses a host-reported state name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "resumed" => Some(LifecycleState::Resumed),
            "inactive" => Some(LifecycleState::Inactive),
            "paused" => Some(LifecycleState::Paused),
            "hidden" => Some(LifecycleState::Hidden),
            "detached" => Some(LifecycleState::Detached),
            _ => None,
        }
    }
}

type Subscriber = Arc<dyn Fn(LifecycleState) + Send + Sync>;

#[derive(Default)]
struct MonitorInner {
    current: Mutex<Option<LifecycleState>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

/// Last-known lifecycle state with change notification.
#[derive(Clone, Default)]
pub struct LifecycleMonitor {
    inner: Arc<MonitorInner>,
}

impl fmt::Debug for LifecycleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMonitor")
            .field("current", &self.current())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl LifecycleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked on every state change.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(LifecycleState) + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Records a new host state and notifies subscribers.
    ///
    /// Returns `false` without notifying when `state` is `None` or equal to
    /// the current state.
    pub fn update(&self, state: Option<LifecycleState>) -> bool {
        let Some(state) = state else {
            debug!("Ignoring unknown lifecycle state");
            return false;
        };

        {
            let mut current = self.inner.current.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == Some(state) {
                return false;
            }
            *current = Some(state);
        }

        // Snapshot so callbacks may subscribe or update without deadlocking.
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        debug!("Lifecycle -> {} ({} subscriber(s))", state, subscribers.len());
        for subscriber in subscribers {
            subscriber(state);
        }
        true
    }

    pub fn current(&self) -> Option<LifecycleState> {
        *self.inner.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Translates lifecycle transitions into engine actions.
#[derive(Debug, Clone)]
pub struct LifecycleBridge {
    engine: EngineHandle,
}

impl LifecycleBridge {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    /// Subscribes a bridge for `engine` to `monitor`.
    pub fn attach(monitor: &LifecycleMonitor, engine: EngineHandle) {
        let bridge = Self::new(engine);
        monitor.subscribe(move |state| bridge.on_state(state));
    }

    /// Pushes the action for `state`, if any. The completion is not awaited.
    pub fn on_state(&self, state: LifecycleState) {
        match state {
            LifecycleState::Paused => {
                info!("⏸️ Host paused, flushing destination queues");
                let _ = self.engine.flush(None);
            }
            LifecycleState::Resumed => {
                info!("▶️ Host resumed, re-applying setup");
                let _ = self.engine.reapply_setup();
            }
            other => debug!("Lifecycle state {} needs no action", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ActionKind, EngineShared};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_update_notifies_in_registration_order() {
        let monitor = LifecycleMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            monitor.subscribe(move |state| seen.lock().unwrap().push(format!("{}:{}", tag, state)));
        }

        assert!(monitor.update(Some(LifecycleState::Paused)));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:paused", "second:paused", "third:paused"]
        );
        assert_eq!(monitor.current(), Some(LifecycleState::Paused));
    }

    #[test]
    fn test_unchanged_or_unknown_state_is_not_notified() {
        let monitor = LifecycleMonitor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(monitor.update(Some(LifecycleState::Resumed)));
        assert!(!monitor.update(Some(LifecycleState::Resumed)));
        assert!(!monitor.update(None));
        assert!(monitor.update(Some(LifecycleState::Inactive)));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.current(), Some(LifecycleState::Inactive));
    }

    #[test]
    fn test_callback_may_subscribe_during_notification() {
        let monitor = LifecycleMonitor::new();
        let inner = monitor.clone();
        monitor.subscribe(move |_| inner.subscribe(|_| {}));

        assert!(monitor.update(Some(LifecycleState::Hidden)));
        assert_eq!(monitor.subscriber_count(), 2);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(LifecycleState::from_name("Paused"), Some(LifecycleState::Paused));
        assert_eq!(LifecycleState::from_name(" detached "), Some(LifecycleState::Detached));
        assert_eq!(LifecycleState::from_name("sleeping"), None);

        let parsed: LifecycleState = serde_json::from_str("\"resumed\"").unwrap();
        assert_eq!(parsed, LifecycleState::Resumed);
    }

    #[test]
    fn test_bridge_maps_states_to_actions() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = EngineHandle::from_parts(tx, Arc::new(EngineShared::new()));
        let monitor = LifecycleMonitor::new();
        LifecycleBridge::attach(&monitor, engine);

        monitor.update(Some(LifecycleState::Resumed));
        monitor.update(Some(LifecycleState::Inactive));
        monitor.update(Some(LifecycleState::Paused));
        monitor.update(Some(LifecycleState::Hidden));
        monitor.update(Some(LifecycleState::Paused));
        monitor.update(Some(LifecycleState::Detached));

        let mut kinds = Vec::new();
        while let Ok(action) = rx.try_recv() {
            kinds.push(action.kind());
        }
        assert_eq!(kinds, vec![ActionKind::Setup, ActionKind::Flush, ActionKind::Flush]);
    }
}
