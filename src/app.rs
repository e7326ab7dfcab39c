//! # Application Coordinator
//!
//! Owns one instance of every component and wires them together: the local
//! store, the remote client, connectivity, the sync engine, the capture
//! queues and notifications.
//!
//! ## Lifecycle
//!
//! 1. [`SyncApp::open`] (or [`SyncApp::from_parts`]) recovers records left
//!    `uploading` by a previous process
//! 2. [`SyncApp::start_background`] spawns the reconnect watcher and the
//!    notification forwarder
//! 3. [`SyncApp::shutdown`] stops a running pass, waits up to the configured
//!    grace period and marks in-flight records for re-validation

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::local_db::{LocalDatabase, LocalStore};
use crate::notify::Notifier;
use crate::offline::{CaptureService, PhotoQueue, RecordingQueue};
use crate::remote::{HttpRemoteApi, RemoteApi};
use crate::shared::config::AppConfig;
use crate::shared::error::Result;
use crate::shared::event::SyncResult;
use crate::shared::record::StorageStats;
use crate::sync::{ConnectivityProvider, ConnectivityWatcher, NetworkMonitor, SyncEngine};

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub online: bool,
    pub syncing: bool,
    pub last_sync: Option<String>,
    pub stats: StorageStats,
}

pub struct SyncApp {
    config: AppConfig,
    store: LocalStore,
    network: Arc<NetworkMonitor>,
    engine: Arc<SyncEngine>,
    recordings: Arc<RecordingQueue>,
    photos: PhotoQueue,
    capture: CaptureService,
    notifier: Notifier,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for SyncApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncApp")
            .field("server_url", &self.config.server_url)
            .field("online", &self.network.is_online())
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl SyncApp {
    /// Open the SQLite store and HTTP client described by `config`
    pub async fn open(config: AppConfig) -> Result<Self> {
        let database = LocalDatabase::open(config.database_path()).await?;
        let remote = Arc::new(HttpRemoteApi::new(&config)?);
        let network = Arc::new(NetworkMonitor::with_probe(&config, true)?);
        Self::from_parts(
            config,
            LocalStore::new(database),
            remote,
            network,
            Notifier::default(),
        )
        .await
    }

    /// Assemble the app from pre-built components
    pub async fn from_parts(
        config: AppConfig,
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        network: Arc<NetworkMonitor>,
        notifier: Notifier,
    ) -> Result<Self> {
        let recovered = store.recover_in_flight().await?;
        if recovered > 0 {
            tracing::info!("[App] Re-queued {} record(s) interrupted by the last shutdown", recovered);
        }

        let recordings = RecordingQueue::new(store.clone(), remote.clone(), network.clone(), &config)
            .with_notifier(notifier.clone());
        let engine = SyncEngine::new(store.clone(), remote, &config).with_recording_queue(&recordings);
        let photos = PhotoQueue::new(store.clone())
            .compression_enabled(config.compress_photos)
            .with_notifier(notifier.clone());
        let capture = CaptureService::new(store.clone()).with_notifier(notifier.clone());

        Ok(Self {
            config,
            store,
            network,
            engine: Arc::new(engine),
            recordings: Arc::new(recordings),
            photos,
            capture,
            notifier,
            workers: Vec::new(),
        })
    }

    /// Spawn the reconnect watcher and the event-to-toast forwarder.
    /// Calling it again while they run does nothing.
    pub fn start_background(&mut self) {
        if !self.workers.is_empty() {
            return;
        }
        let forwarder = tokio::spawn(self.notifier.clone().run(self.engine.subscribe()));
        let watcher = ConnectivityWatcher::new(self.network.clone(), self.engine.clone())
            .with_notifier(self.notifier.clone())
            .spawn();
        self.workers.push(forwarder);
        self.workers.push(watcher);
        tracing::debug!("[App] Background tasks started");
    }

    /// Also poll the health endpoint every `interval`
    pub fn start_probe(&mut self, interval: Duration) {
        self.workers.push(self.network.clone().spawn_probe_loop(interval));
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn recordings(&self) -> &Arc<RecordingQueue> {
        &self.recordings
    }

    pub fn photos(&self) -> &PhotoQueue {
        &self.photos
    }

    pub fn capture(&self) -> &CaptureService {
        &self.capture
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run a drain pass now
    pub async fn sync_now(&self) -> Result<SyncResult> {
        self.engine.start().await
    }

    pub async fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            online: self.network.is_online(),
            syncing: self.engine.is_running(),
            last_sync: self.store.last_sync_time().await?,
            stats: self.store.stats().await?,
        })
    }

    /// Stop the engine, wait up to `shutdown_grace`, abort background tasks
    /// and put interrupted uploads back to `pending`
    pub async fn shutdown(mut self) -> Result<()> {
        tracing::info!("[App] Shutting down");
        self.engine.stop();
        if !self.engine.wait_idle(self.config.shutdown_grace).await {
            tracing::warn!(
                "[App] Sync still running after {:?}, in-flight records will be re-validated",
                self.config.shutdown_grace
            );
        }

        for worker in self.workers.drain(..) {
            worker.abort();
        }

        let recovered = self.store.recover_in_flight().await?;
        if recovered > 0 {
            tracing::info!("[App] Marked {} in-flight record(s) for re-validation", recovered);
        }
        Ok(())
    }
}

impl Drop for SyncApp {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
