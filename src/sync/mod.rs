//! # Sync Engine
//!
//! Drains the local queues to the remote API.
//!
//! ## Architecture
//!
//! - **`drain`**: per-item lifecycle, uploaders and the circuit breaker
//! - **`broadcast`**: typed event channel with subscription handles
//! - **`network_monitor`**: connectivity provider and reconnect watcher
//! - **`sync_state`**: `idle -> running -> completed | aborted -> idle` per run
//! - **`metrics`**: per-run durations and totals
//!
//! ## Guarantees
//!
//! - **Single flight**: a second `start()` while a pass runs is rejected
//!   with [`SyncError::AlreadyRunning`] and an `error` event, never queued
//! - **Dependency order**: assessments, deficiencies, photos, recordings;
//!   oldest first within a category
//! - **Circuit breaker**: after `max_consecutive_failures` consecutive item
//!   failures the rest of the pass is skipped, across all categories
//! - **Cooperative stop**: `stop()` lets the in-flight item finish and
//!   starts no new one. A stop that lands before the pass claims its first
//!   item still applies; the request is cleared when the pass ends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldsync::local_db::{LocalDatabase, LocalStore};
//! use fieldsync::remote::HttpRemoteApi;
//! use fieldsync::shared::AppConfig;
//! use fieldsync::sync::SyncEngine;
//!
//! # async fn example() -> fieldsync::shared::Result<()> {
//! let config = AppConfig::load(None)?;
//! let store = LocalStore::new(LocalDatabase::open(config.database_path()).await?);
//! let remote = Arc::new(HttpRemoteApi::new(&config)?);
//! let engine = SyncEngine::new(store, remote, &config);
//!
//! let mut events = engine.subscribe();
//! let result = engine.start().await?;
//! println!("{} synced, {} failed", result.synced, result.failed);
//! while let Some(event) = events.try_recv() {
//!     println!("{:?}", event.event_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod drain;
pub mod metrics;
pub mod network_monitor;
pub mod sync_state;

pub use broadcast::{EventBus, EventSubscription};
pub use drain::{CircuitBreaker, DrainPass, FlightGuard, Uploader};
pub use metrics::SyncMetrics;
pub use network_monitor::{ConnectivityProvider, ConnectivityWatcher, NetworkMonitor};
pub use sync_state::{SyncPhase, SyncState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::local_db::LocalStore;
use crate::offline::recordings::{RecordingQueue, RecordingUploader};
use crate::remote::RemoteApi;
use crate::shared::config::AppConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::event::{SyncEvent, SyncResult};
use crate::shared::record::Category;
use drain::{AssessmentUploader, DeficiencyUploader, PhotoUploader};

/// Coordinates drain passes over the local store
pub struct SyncEngine {
    store: LocalStore,
    /// In drain order
    uploaders: Vec<Arc<dyn Uploader>>,
    events: EventBus,
    running: Arc<AtomicBool>,
    /// Mirrors `running` for `wait_idle`
    running_tx: watch::Sender<bool>,
    /// Shared with the recording queue's `process_queue`
    recording_flight: Arc<AtomicBool>,
    stop_requested: AtomicBool,
    state: RwLock<SyncState>,
    metrics: RwLock<SyncMetrics>,
    max_consecutive_failures: u32,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("running", &self.is_running())
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, config: &AppConfig) -> Self {
        let uploaders: Vec<Arc<dyn Uploader>> = vec![
            Arc::new(AssessmentUploader::new(remote.clone())),
            Arc::new(DeficiencyUploader::new(remote.clone())),
            Arc::new(PhotoUploader::new(remote.clone())),
            Arc::new(RecordingUploader::new(remote)),
        ];
        Self::with_uploaders(store, uploaders, config)
    }

    /// Engine over custom uploaders, drained in `Category::DRAIN_ORDER`
    pub fn with_uploaders(
        store: LocalStore,
        mut uploaders: Vec<Arc<dyn Uploader>>,
        config: &AppConfig,
    ) -> Self {
        uploaders.sort_by_key(|u| {
            Category::DRAIN_ORDER
                .iter()
                .position(|c| *c == u.category())
                .unwrap_or(usize::MAX)
        });
        Self {
            store,
            uploaders,
            events: EventBus::default(),
            running: Arc::new(AtomicBool::new(false)),
            running_tx: watch::Sender::new(false),
            recording_flight: Arc::new(AtomicBool::new(false)),
            stop_requested: AtomicBool::new(false),
            state: RwLock::new(SyncState::default()),
            metrics: RwLock::new(SyncMetrics::new()),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Share single-flight with `queue` so recordings are never uploaded by
    /// the engine and `process_queue` at the same time
    pub fn with_recording_queue(mut self, queue: &RecordingQueue) -> Self {
        self.recording_flight = queue.processing_flag();
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }

    /// Ask the current (or about to start) pass to stop after its in-flight
    /// item. The request holds until a pass ends.
    pub fn stop(&self) {
        tracing::info!("[Sync] Stop requested");
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Wait for a running pass to end; false if `timeout` elapsed first
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut running = self.running_tx.subscribe();
        let idle = match tokio::time::timeout(timeout, running.wait_for(|busy| !*busy)).await {
            Ok(result) => result.is_ok(),
            Err(_) => false,
        };
        idle
    }

    /// Run one drain pass across all categories
    pub async fn start(&self) -> Result<SyncResult> {
        let Some(flight) = FlightGuard::try_acquire(&self.running) else {
            tracing::warn!("[Sync] Sync already in progress, rejecting start");
            self.events.emit(SyncEvent::error("Sync already in progress"));
            return Err(SyncError::AlreadyRunning);
        };
        let _pass = PassGuard::new(flight, &self.running_tx, &self.stop_requested);

        match self.run_pass().await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!("[Sync] Pass failed: {}", e);
                let result = SyncResult {
                    success: false,
                    aborted: true,
                    ..Default::default()
                };
                self.state.write().await.finish(&result);
                self.metrics.write().await.record_run_end(&result);
                self.events.emit(SyncEvent::error(e.to_string()));
                self.state.write().await.reset();
                Err(e)
            }
        }
    }

    async fn run_pass(&self) -> Result<SyncResult> {
        let total = self.store.stats().await?.pending;

        self.state.write().await.begin(total);
        self.metrics.write().await.record_run_start();
        self.events.emit(SyncEvent::start(total));
        tracing::info!("[Sync] Starting pass over {} pending record(s)", total);

        let mut pass = DrainPass::new(&self.store, self.max_consecutive_failures)
            .with_stop(&self.stop_requested)
            .with_events(&self.events)
            .with_state(&self.state)
            .with_total(total);

        for uploader in &self.uploaders {
            if uploader.category() == Category::Recording {
                let Some(_recordings) = FlightGuard::try_acquire(&self.recording_flight) else {
                    tracing::debug!("[Sync] Recording queue busy, leaving recordings to it");
                    continue;
                };
                pass.drain(uploader.as_ref()).await?;
            } else {
                pass.drain(uploader.as_ref()).await?;
            }
        }

        let result = pass.result();
        if result.synced > 0 {
            if let Err(e) = self.store.set_last_sync_time().await {
                tracing::warn!("[Sync] Could not record last sync time: {}", e);
            }
        }

        self.state.write().await.finish(&result);
        self.metrics.write().await.record_run_end(&result);
        self.events.emit(SyncEvent::complete(result.clone()));
        self.state.write().await.reset();
        tracing::info!(
            "[Sync] Pass finished: {} synced, {} failed{}",
            result.synced,
            result.failed,
            if result.aborted { " (aborted)" } else { "" }
        );
        Ok(result)
    }
}

/// Holds the engine's flight for one pass. On drop, including a cancelled
/// `start()`, it clears the stop request, releases the flight and then wakes
/// `wait_idle` callers.
struct PassGuard<'a> {
    flight: Option<FlightGuard>,
    running_tx: &'a watch::Sender<bool>,
    stop_requested: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn new(flight: FlightGuard, running_tx: &'a watch::Sender<bool>, stop_requested: &'a AtomicBool) -> Self {
        running_tx.send_replace(true);
        Self {
            flight: Some(flight),
            running_tx,
            stop_requested,
        }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.stop_requested.store(false, Ordering::Release);
        drop(self.flight.take());
        self.running_tx.send_replace(false);
    }
}
