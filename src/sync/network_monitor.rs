//! # Network Monitor
//!
//! Connectivity detection for sync scheduling.
//!
//! - **[`ConnectivityProvider`]**: the injectable online/offline source
//! - **[`NetworkMonitor`]**: driven by platform events (`set_online`) and an
//!   optional HTTP health probe
//! - **[`ConnectivityWatcher`]**: reacts to transitions; going online resets
//!   failed records and starts a drain pass

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::notify::Notifier;
use crate::shared::config::AppConfig;
use crate::shared::error::{Result, SyncError};
use crate::sync::SyncEngine;

/// Source of online/offline state
pub trait ConnectivityProvider: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that changes on every transition
    fn watch(&self) -> watch::Receiver<bool>;
}

#[derive(Debug, Clone)]
struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

/// Connectivity state fed by platform events and an optional health probe
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
    probe: Option<HealthProbe>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx, probe: None }
    }

    /// Monitor that can probe `{server_url}{health_path}`
    pub fn with_probe(config: &AppConfig, online: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout.unwrap_or(Duration::from_secs(5)))
            .build()
            .map_err(|e| SyncError::network(format!("Failed to build probe client: {}", e)))?;
        let mut monitor = Self::new(online);
        monitor.probe = Some(HealthProbe {
            client,
            url: config.api_url(&config.health_path),
        });
        Ok(monitor)
    }

    /// Record a platform online/offline event. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(
                "[Network] Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Probe the health endpoint and update the state; without a probe the
    /// current state is returned unchanged
    pub async fn probe(&self) -> bool {
        let Some(probe) = &self.probe else {
            return self.is_online();
        };
        let online = match probe.client.get(&probe.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("[Network] Health probe failed: {}", e);
                false
            }
        };
        self.set_online(online);
        online
    }

    /// Probe every `interval` until the handle is aborted
    pub fn spawn_probe_loop(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.probe().await;
            }
        })
    }
}

impl ConnectivityProvider for NetworkMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Runs a drain pass whenever connectivity comes back
pub struct ConnectivityWatcher {
    /// Subscribed at construction so no transition after `new` is missed
    rx: watch::Receiver<bool>,
    was_online: bool,
    engine: Arc<SyncEngine>,
    notifier: Option<Notifier>,
}

impl ConnectivityWatcher {
    pub fn new(connectivity: Arc<dyn ConnectivityProvider>, engine: Arc<SyncEngine>) -> Self {
        let rx = connectivity.watch();
        let was_online = *rx.borrow();
        Self {
            rx,
            was_online,
            engine,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Watch transitions until the provider goes away
    pub async fn run(mut self) {
        while self.rx.changed().await.is_ok() {
            let online = *self.rx.borrow_and_update();
            if online == self.was_online {
                continue;
            }
            self.was_online = online;

            if let Some(notifier) = &self.notifier {
                notifier.connectivity_changed(online);
            }
            if online {
                self.on_online().await;
            }
        }
        tracing::debug!("[Network] Connectivity source closed, watcher exiting");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Failed records get another chance on every reconnect
    async fn on_online(&self) {
        match self.engine.store().reset_failed(None).await {
            Ok(0) => {}
            Ok(count) => tracing::info!("[Network] Back online, retrying {} failed record(s)", count),
            Err(e) => tracing::error!("[Network] Could not reset failed records: {}", e),
        }

        match self.engine.start().await {
            Ok(result) => tracing::debug!(
                "[Network] Reconnect pass finished: {} synced, {} failed",
                result.synced,
                result.failed
            ),
            Err(SyncError::AlreadyRunning) => {
                tracing::debug!("[Network] Pass already running on reconnect")
            }
            Err(e) => tracing::warn!("[Network] Reconnect pass failed: {}", e),
        }
    }
}
