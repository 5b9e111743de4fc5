mod runner;

pub use runner::EvseRunner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use infrastructure::{EventBus, EventEmitter, EventListener, meter};
use tokio::sync::{Mutex, Notify, watch};

use crate::device::{EvseApi, EvseHttpClient, Payload, Snapshot};

#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub snapshot: Snapshot,
    pub success: bool,
    pub generation: u64,
}

/// Owns the current snapshot and the refresh cycle. Clones share the same state.
pub struct EvseCoordinator<A = EvseHttpClient> {
    inner: Arc<Inner<A>>,
}

struct Inner<A> {
    api: Arc<A>,
    snapshot: watch::Sender<Snapshot>,
    last_update_success: AtomicBool,
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
    refresh_requested: Notify,
    update_interval: watch::Sender<Duration>,
    cycle_timeout: Duration,
    bus: EventBus<SnapshotEvent>,
    events: EventEmitter<SnapshotEvent>,
}

impl<A> Clone for EvseCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

enum CycleOutcome {
    Success(Snapshot),
    Failed,
}

impl<A: EvseApi> EvseCoordinator<A> {
    pub fn new(api: Arc<A>, update_interval: Duration, cycle_timeout: Duration) -> Self {
        let bus = EventBus::new(16);
        let events = bus.emitter();

        Self {
            inner: Arc::new(Inner {
                api,
                snapshot: watch::Sender::new(Snapshot::empty()),
                last_update_success: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                refresh_lock: Mutex::new(()),
                refresh_requested: Notify::new(),
                update_interval: watch::Sender::new(update_interval),
                cycle_timeout,
                bus,
                events,
            }),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.inner.api
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::SeqCst)
    }

    /// Number of completed refresh cycles.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn update_interval(&self) -> Duration {
        *self.inner.update_interval.borrow()
    }

    /// Changes the polling cadence. The runner restarts its timer with the new interval.
    pub fn set_update_interval(&self, interval: Duration) {
        let changed = self.inner.update_interval.send_if_modified(|current| {
            if *current == interval {
                false
            } else {
                *current = interval;
                true
            }
        });

        if changed {
            tracing::info!("EVSE update interval changed to {:?}", interval);
        }
    }

    pub fn subscribe(&self) -> EventListener<SnapshotEvent> {
        self.inner.bus.subscribe()
    }

    /// Asks the runner for an out-of-band refresh. Requests made while one is pending are merged.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    pub(crate) async fn refresh_requested(&self) {
        self.inner.refresh_requested.notified().await
    }

    pub(crate) fn watch_update_interval(&self) -> watch::Receiver<Duration> {
        self.inner.update_interval.subscribe()
    }

    /// Runs one refresh cycle, or joins the one in flight and returns its result.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Snapshot {
        let seen_generation = self.generation();
        let _guard = self.inner.refresh_lock.lock().await;

        if self.generation() != seen_generation {
            tracing::debug!("Refresh completed while waiting, skipping");
            return self.snapshot();
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.inner.cycle_timeout, self.fetch_all()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("EVSE refresh timed out after {:?}", self.inner.cycle_timeout);
                CycleOutcome::Failed
            }
        };

        let (snapshot, success) = match outcome {
            CycleOutcome::Success(snapshot) => (snapshot, true),
            CycleOutcome::Failed => (Snapshot::empty(), false),
        };

        self.inner.snapshot.send_replace(snapshot.clone());
        self.inner.last_update_success.store(success, Ordering::SeqCst);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = if success { "success" } else { "failed" };
        meter::increment("evse_refresh_total", &[("result", result)]);
        meter::record(
            "evse_refresh_duration_seconds",
            started.elapsed().as_secs_f64(),
            &[("result", result)],
        );

        tracing::debug!(
            "EVSE refresh #{} finished ({}) with {} fields",
            generation,
            result,
            snapshot.len()
        );

        self.inner.events.send(SnapshotEvent {
            snapshot: snapshot.clone(),
            success,
            generation,
        });

        snapshot
    }

    async fn fetch_all(&self) -> CycleOutcome {
        let init = self.inner.api.fetch_init().await;
        if let Err(e) = &init {
            tracing::error!("Error fetching /init: {:?}", e);
        }

        let main = self.inner.api.fetch_main().await;
        if let Err(e) = &main {
            tracing::error!("Error fetching /main: {:?}", e);
        }

        match (init, main) {
            (Err(_), Err(_)) => CycleOutcome::Failed,
            (init, main) => CycleOutcome::Success(Snapshot::merge(
                init.unwrap_or_else(|_| Payload::new()),
                main.unwrap_or_else(|_| Payload::new()),
            )),
        }
    }
}
