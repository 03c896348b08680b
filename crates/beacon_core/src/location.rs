//! Periodic location polling.
//!
//! The poller asks a [`LocationProvider`] for a fix on every tick and tracks
//! each one as a `"Location Updated"` event. The tick interval lives in a
//! shared setting that is re-read after every tick; when it has changed the
//! timer is rebuilt with the new period.

use crate::engine::EngineHandle;
use crate::error::LocationError;
use crate::lifecycle::{LifecycleMonitor, LifecycleState};
use crate::segment::{Properties, Segment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Event name used for every tracked fix.
pub const LOCATION_EVENT: &str = "Location Updated";

/// Default polling interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

/// Intervals below this are clamped up to it.
pub const MIN_INTERVAL_MS: u64 = 1_000;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
}

impl Location {
    pub fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert("latitude".to_string(), json!(self.latitude));
        properties.insert("longitude".to_string(), json!(self.longitude));
        properties.insert("accuracy".to_string(), json!(self.accuracy));
        properties
    }
}

/// Source of position fixes.
///
/// `Ok(None)` means no fix is available right now (no permission, no
/// signal); the tick is skipped without complaint.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current(&self) -> Result<Option<Location>, LocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Pause,
    Stop,
}

/// Whether the poller is currently ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollerState {
    Idle,
    Polling,
}

/// Polls a [`LocationProvider`] and tracks fixes through the engine.
pub struct LocationPoller {
    provider: Arc<dyn LocationProvider>,
    engine: EngineHandle,
    interval_ms: Arc<AtomicU64>,
    control: watch::Sender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LocationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPoller")
            .field("state", &self.state())
            .field("interval_ms", &self.interval_ms())
            .finish()
    }
}

impl LocationPoller {
    pub fn new(provider: Arc<dyn LocationProvider>, engine: EngineHandle, interval: Duration) -> Self {
        let (control, _) = watch::channel(Command::Pause);
        Self {
            provider,
            engine,
            interval_ms: Arc::new(AtomicU64::new(clamp_interval(interval))),
            control,
            task: Mutex::new(None),
        }
    }

    /// Starts ticking. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        self.send(Command::Run);
        if task.is_none() {
            info!("📍 Location polling started every {}ms", self.interval_ms());
            *task = Some(tokio::spawn(poll_loop(
                self.control.subscribe(),
                self.interval_ms.clone(),
                self.provider.clone(),
                self.engine.clone(),
            )));
        }
    }

    /// Suspends ticking until [`resume`](Self::resume). No-op if not started.
    pub fn pause(&self) {
        if self.is_started() {
            debug!("Location polling paused");
            self.send(Command::Pause);
        }
    }

    /// Resumes a paused poller. No-op if never started.
    pub fn resume(&self) {
        if self.is_started() {
            debug!("Location polling resumed");
            self.send(Command::Run);
        }
    }

    /// Stops the polling task and waits for it to exit.
    pub async fn stop(&self) {
        self.send(Command::Stop);
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Location polling task ended abnormally: {}", e);
            }
            info!("📍 Location polling stopped");
        }
    }

    pub fn state(&self) -> PollerState {
        if self.is_started() && *self.control.borrow() == Command::Run {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    /// Changes the polling interval; picked up after the next tick.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms.store(clamp_interval(interval), Ordering::SeqCst);
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    /// Pauses on `Paused` and resumes on `Resumed`.
    pub fn attach(self: &Arc<Self>, monitor: &LifecycleMonitor) {
        let poller = Arc::downgrade(self);
        monitor.subscribe(move |state| {
            let Some(poller) = poller.upgrade() else {
                return;
            };
            match state {
                LifecycleState::Paused => poller.pause(),
                LifecycleState::Resumed => poller.resume(),
                _ => {}
            }
        });
    }

    fn is_started(&self) -> bool {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn send(&self, command: Command) {
        self.control.send_if_modified(|current| {
            if *current == command {
                false
            } else {
                *current = command;
                true
            }
        });
    }
}

impl Drop for LocationPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

fn clamp_interval(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis())
        .unwrap_or(u64::MAX)
        .max(MIN_INTERVAL_MS)
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn poll_loop(
    mut control: watch::Receiver<Command>,
    interval_ms: Arc<AtomicU64>,
    provider: Arc<dyn LocationProvider>,
    engine: EngineHandle,
) {
    loop {
        let command = *control.borrow_and_update();
        match command {
            Command::Stop => break,
            Command::Pause => {
                if control.changed().await.is_err() {
                    break;
                }
                continue;
            }
            Command::Run => {}
        }

        let mut period = Duration::from_millis(interval_ms.load(Ordering::SeqCst));
        let mut timer = ticker(period);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    poll_once(provider.as_ref(), &engine).await;

                    let latest = Duration::from_millis(interval_ms.load(Ordering::SeqCst));
                    if latest != period {
                        debug!("Location interval changed {:?} -> {:?}", period, latest);
                        period = latest;
                        timer = ticker(period);
                    }
                }
                changed = control.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

async fn poll_once(provider: &dyn LocationProvider, engine: &EngineHandle) {
    match provider.current().await {
        Ok(Some(fix)) => {
            debug!("📍 Location fix {:.5},{:.5} ±{}m", fix.latitude, fix.longitude, fix.accuracy);
            let completion = engine.log(Segment::track(LOCATION_EVENT, Some(fix.to_properties())));
            tokio::spawn(async move {
                if let Err(e) = completion.await {
                    debug!("Location event not recorded: {}", e);
                }
            });
        }
        Ok(None) => debug!("No location fix available, skipping"),
        Err(e) => debug!("Location provider failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Action, EngineShared};
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    struct ScriptedProvider {
        fixes: Mutex<VecDeque<Option<Location>>>,
    }

    impl ScriptedProvider {
        fn new(fixes: Vec<Option<Location>>) -> Arc<Self> {
            Arc::new(Self {
                fixes: Mutex::new(fixes.into()),
            })
        }
    }

    #[async_trait]
    impl LocationProvider for ScriptedProvider {
        async fn current(&self) -> Result<Option<Location>, LocationError> {
            Ok(self.fixes.lock().unwrap().pop_front().flatten())
        }
    }

    fn fix(latitude: f64) -> Option<Location> {
        Some(Location {
            latitude,
            longitude: 13.4,
            accuracy: 5.0,
        })
    }

    fn poller(
        provider: Arc<dyn LocationProvider>,
        interval_ms: u64,
    ) -> (Arc<LocationPoller>, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = EngineHandle::from_parts(tx, Arc::new(EngineShared::new()));
        let poller = Arc::new(LocationPoller::new(provider, engine, Duration::from_millis(interval_ms)));
        (poller, rx)
    }

    fn drain_latitudes(rx: &mut mpsc::UnboundedReceiver<Action>) -> Vec<f64> {
        let mut latitudes = Vec::new();
        while let Ok(action) = rx.try_recv() {
            if let Action::Log { segment, .. } = action {
                assert_eq!(segment.name(), LOCATION_EVENT);
                if let Segment::Track { properties: Some(props), .. } = segment {
                    latitudes.push(props["latitude"].as_f64().unwrap());
                }
            }
        }
        latitudes
    }

    /// Lets the polling task run until it is parked again.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixes_are_tracked_and_gaps_skipped() {
        let provider = ScriptedProvider::new(vec![fix(1.0), None, fix(3.0)]);
        let (poller, mut rx) = poller(provider, 1_000);

        assert_eq!(poller.state(), PollerState::Idle);
        poller.start();
        assert_eq!(poller.state(), PollerState::Polling);
        settle().await;

        for _ in 0..3 {
            advance(1_000).await;
        }

        assert_eq!(drain_latitudes(&mut rx), vec![1.0, 3.0]);
        poller.stop().await;
        assert_eq!(poller.state(), PollerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_follow_lifecycle() {
        let provider = ScriptedProvider::new((0..10).map(|i| fix(i as f64)).collect());
        let (poller, mut rx) = poller(provider, 1_000);
        let monitor = LifecycleMonitor::new();
        poller.attach(&monitor);
        poller.start();
        settle().await;

        advance(1_000).await;
        assert_eq!(drain_latitudes(&mut rx), vec![0.0]);

        monitor.update(Some(LifecycleState::Paused));
        assert_eq!(poller.state(), PollerState::Idle);
        settle().await;
        advance(5_000).await;
        assert!(drain_latitudes(&mut rx).is_empty());

        monitor.update(Some(LifecycleState::Resumed));
        assert_eq!(poller.state(), PollerState::Polling);
        settle().await;
        advance(1_000).await;
        assert_eq!(drain_latitudes(&mut rx), vec![1.0]);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_rebuilds_timer() {
        let provider = ScriptedProvider::new((0..10).map(|i| fix(i as f64)).collect());
        let (poller, mut rx) = poller(provider, 1_000);
        poller.start();
        settle().await;

        advance(1_000).await;
        assert_eq!(drain_latitudes(&mut rx), vec![0.0]);

        poller.set_interval(Duration::from_millis(5_000));
        advance(1_000).await;
        // Still the old period for the tick already scheduled.
        assert_eq!(drain_latitudes(&mut rx), vec![1.0]);

        advance(4_000).await;
        assert!(drain_latitudes(&mut rx).is_empty());
        advance(1_000).await;
        assert_eq!(drain_latitudes(&mut rx), vec![2.0]);

        poller.stop().await;
    }

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(clamp_interval(Duration::from_millis(10)), MIN_INTERVAL_MS);
        assert_eq!(clamp_interval(Duration::from_secs(90)), 90_000);
    }

    #[tokio::test]
    async fn test_resume_before_start_is_noop() {
        let (poller, _rx) = poller(ScriptedProvider::new(vec![]), 1_000);
        poller.resume();
        assert_eq!(poller.state(), PollerState::Idle);
        poller.stop().await;
    }
}
