//! Swarm monitor implementation.
//!
//! A single loop drains observer events every `event_poll_interval_ms`,
//! classifies them, and decides per announced hash whether to resolve it:
//! - already resolving in this process: record the re-sighting only
//! - stored as `Success`: refresh `last_seen` only
//! - otherwise: dispatch a resolution on its own task
//!
//! Resolutions never block the loop, and a failure handling one event never
//! affects the next.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::classifier::{classify, Classified};
use crate::record::{RecordError, RecordStore, ResolutionStatus, UpsertRecord};
use crate::resolver::{MetadataResolver, ResolutionOutcome, ResolveError};
use crate::swarm::{InfoHash, SwarmEvent, SwarmObserver};

use super::config::MonitorConfig;
use super::types::{MonitorError, MonitorStatus};

#[derive(Default)]
struct Counters {
    events_seen: AtomicU64,
    announces: AtomicU64,
    resolutions_started: AtomicU64,
    resolutions_succeeded: AtomicU64,
    resolutions_timed_out: AtomicU64,
    resolutions_failed: AtomicU64,
    skipped: AtomicU64,
    resighted_in_flight: AtomicU64,
    store_failures: AtomicU64,
    consecutive_store_failures: AtomicU32,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// State shared between the loop and the resolution tasks.
struct Shared {
    counters: Counters,
    in_flight: Mutex<HashSet<InfoHash>>,
    alert_threshold: u32,
}

impl Shared {
    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<InfoHash>> {
        // The set only holds hashes; a poisoned lock still has usable contents.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_ok(&self) {
        let previous = self
            .counters
            .consecutive_store_failures
            .swap(0, Ordering::Relaxed);
        if previous >= self.alert_threshold {
            info!(failures = previous, "Record store recovered");
        }
    }

    fn store_failed(&self, hash: &InfoHash, error: &RecordError) {
        bump(&self.counters.store_failures);
        let consecutive = self
            .counters
            .consecutive_store_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        if consecutive >= self.alert_threshold {
            error!(
                hash = %hash,
                consecutive,
                "Record store failing repeatedly: {}",
                error
            );
        } else {
            warn!(hash = %hash, consecutive, "Record store error: {}", error);
        }
    }
}

/// Removes a hash from the in-flight set when its task ends, aborted or not.
struct InFlightGuard {
    shared: Arc<Shared>,
    hash: InfoHash,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight().remove(&self.hash);
    }
}

/// Everything needed to handle events; cloned into the loop task.
#[derive(Clone)]
struct EventProcessor {
    observer: Arc<dyn SwarmObserver>,
    store: Arc<dyn RecordStore>,
    resolver: MetadataResolver,
    shared: Arc<Shared>,
    resolutions: Arc<tokio::sync::Mutex<JoinSet<()>>>,
    permits: Option<Arc<Semaphore>>,
}

impl EventProcessor {
    async fn process_events(&self) -> usize {
        let events = self.observer.pop_events().await;
        let count = events.len();
        for event in events {
            if let Err(e) = self.handle_event(event).await {
                debug!("Event handling error: {}", e);
            }
        }
        self.reap_finished().await;
        count
    }

    async fn handle_event(&self, event: SwarmEvent) -> Result<(), MonitorError> {
        bump(&self.shared.counters.events_seen);

        match classify(event) {
            Classified::HashAnnounced { hash, name } => self.handle_announce(hash, name).await,
            Classified::StatsEvent {
                node_count,
                active_request_count,
            } => {
                info!(
                    node_count,
                    active_request_count,
                    in_flight = self.shared.in_flight().len(),
                    "DHT stats"
                );
                Ok(())
            }
            Classified::DiagnosticEvent { text } => {
                debug!(observer = self.observer.name(), "{}", text);
                Ok(())
            }
            Classified::Unclassified { kind, text } => {
                debug!(kind = %kind, "Ignoring event: {}", text);
                Ok(())
            }
        }
    }

    async fn handle_announce(&self, hash: InfoHash, name: String) -> Result<(), MonitorError> {
        bump(&self.shared.counters.announces);

        let resolving = self.shared.in_flight().contains(&hash);
        if resolving {
            bump(&self.shared.counters.resighted_in_flight);
            debug!(hash = %hash, "Resolution already in flight, recording sighting");
            return self.with_store(&hash, |store| store.touch(&hash)).map(|_| ());
        }

        let existing = self.with_store(&hash, |store| store.lookup(&hash))?;
        if existing.is_some_and(|record| record.status.is_success()) {
            bump(&self.shared.counters.skipped);
            debug!(hash = %hash, "Already resolved, refreshing last seen");
            let update = UpsertRecord::status_only(hash, ResolutionStatus::Success);
            return self.with_store(&hash, |store| store.upsert(&update)).map(|_| ());
        }

        self.dispatch(hash, name).await;
        Ok(())
    }

    /// Run a store operation, feeding the result into failure tracking.
    fn with_store<T>(
        &self,
        hash: &InfoHash,
        op: impl FnOnce(&dyn RecordStore) -> Result<T, RecordError>,
    ) -> Result<T, MonitorError> {
        match op(self.store.as_ref()) {
            Ok(value) => {
                self.shared.store_ok();
                Ok(value)
            }
            Err(e) => {
                self.shared.store_failed(hash, &e);
                Err(e.into())
            }
        }
    }

    async fn dispatch(&self, hash: InfoHash, name: String) {
        let inserted = self.shared.in_flight().insert(hash);
        if !inserted {
            return;
        }
        bump(&self.shared.counters.resolutions_started);
        info!(hash = %hash, name = %name, "Resolving announced hash");

        let guard = InFlightGuard {
            shared: Arc::clone(&self.shared),
            hash,
        };
        let resolver = self.resolver.clone();
        let shared = Arc::clone(&self.shared);
        let permits = self.permits.clone();

        self.resolutions.lock().await.spawn(async move {
            let _guard = guard;
            let _permit = match permits {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let counters = &shared.counters;
            match resolver.resolve(hash, &name).await {
                Ok(resolution) => {
                    shared.store_ok();
                    match resolution.outcome {
                        ResolutionOutcome::Resolved => bump(&counters.resolutions_succeeded),
                        ResolutionOutcome::TimedOut => bump(&counters.resolutions_timed_out),
                        ResolutionOutcome::Failed(_) => bump(&counters.resolutions_failed),
                    }
                }
                Err(ResolveError::Store(e)) => shared.store_failed(&hash, &e),
            }
        });
    }

    /// Collect finished resolution tasks so the set does not grow.
    async fn reap_finished(&self) {
        let mut resolutions = self.resolutions.lock().await;
        while let Some(result) = resolutions.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Resolution task panicked: {}", e);
                }
            }
        }
    }
}

/// The swarm monitor: drains observer events and drives resolutions.
pub struct SwarmMonitor {
    config: MonitorConfig,
    processor: EventProcessor,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SwarmMonitor {
    /// Create a new monitor.
    pub fn new(
        config: MonitorConfig,
        observer: Arc<dyn SwarmObserver>,
        store: Arc<dyn RecordStore>,
        resolver: MetadataResolver,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let permits = match config.max_concurrent_resolutions {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let processor = EventProcessor {
            observer,
            store,
            resolver,
            shared: Arc::new(Shared {
                counters: Counters::default(),
                in_flight: Mutex::new(HashSet::new()),
                alert_threshold: config.store_failure_alert_threshold.max(1),
            }),
            resolutions: Arc::new(tokio::sync::Mutex::new(JoinSet::new())),
            permits,
        };

        Self {
            config,
            processor,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            event_loop: Mutex::new(None),
        }
    }

    /// Start the monitor (spawns the event loop).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Monitor already running");
            return;
        }

        info!(
            observer = self.processor.observer.name(),
            event_poll_interval_ms = self.config.event_poll_interval_ms,
            metadata_timeout_ms = self.config.metadata_timeout_ms,
            "Starting swarm monitor"
        );

        let handle = self.spawn_event_loop();
        if let Ok(mut event_loop) = self.event_loop.lock() {
            *event_loop = Some(handle);
        }
    }

    /// Stop the monitor. In-flight resolutions are aborted without being recorded.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Monitor not running");
            return;
        }

        info!("Stopping swarm monitor");

        // Signal shutdown to the loop
        let _ = self.shutdown_tx.send(());

        let handle = self
            .event_loop
            .lock()
            .ok()
            .and_then(|mut event_loop| event_loop.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Event loop ended abnormally: {}", e);
            }
        }

        let mut resolutions = self.processor.resolutions.lock().await;
        let aborted = resolutions.len();
        resolutions.abort_all();
        while resolutions.join_next().await.is_some() {}

        info!(aborted, "Swarm monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current monitor status.
    pub fn status(&self) -> MonitorStatus {
        let counters = &self.processor.shared.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MonitorStatus {
            running: self.is_running(),
            events_seen: load(&counters.events_seen),
            announces: load(&counters.announces),
            resolutions_started: load(&counters.resolutions_started),
            resolutions_succeeded: load(&counters.resolutions_succeeded),
            resolutions_timed_out: load(&counters.resolutions_timed_out),
            resolutions_failed: load(&counters.resolutions_failed),
            skipped: load(&counters.skipped),
            resighted_in_flight: load(&counters.resighted_in_flight),
            store_failures: load(&counters.store_failures),
            consecutive_store_failures: counters.consecutive_store_failures.load(Ordering::Relaxed),
            in_flight: self.processor.shared.in_flight().len(),
        }
    }

    /// Drain and handle one batch of observer events. Returns the batch size.
    ///
    /// This is what the loop does on every tick; tests call it directly.
    pub async fn process_events(&self) -> usize {
        self.processor.process_events().await
    }

    /// Handle a single raw event.
    pub async fn handle_event(&self, event: SwarmEvent) -> Result<(), MonitorError> {
        self.processor.handle_event(event).await
    }

    /// Wait until no resolution is in flight.
    ///
    /// Dispatch keeps working while this waits; resolutions started meanwhile
    /// are waited for too.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.processor.resolutions.lock().await);
            if batch.is_empty() {
                break;
            }
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!("Resolution task panicked: {}", e);
                    }
                }
            }
        }
    }

    fn spawn_event_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let processor = self.processor.clone();
        let interval = Duration::from_millis(self.config.event_poll_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Event loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Event loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let handled = processor.process_events().await;
                        if handled > 0 {
                            debug!(events = handled, "Processed event batch");
                        }
                    }
                }
            }
            info!("Event loop stopped");
        })
    }
}
