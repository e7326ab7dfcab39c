//! # Drain Pass
//!
//! One traversal of the pending queues. For each category an [`Uploader`]
//! turns a queued record into a remote call; [`DrainPass`] owns the
//! per-item lifecycle around it:
//!
//! 1. claim the record (`pending -> uploading`), skipping it if another
//!    pass got there first
//! 2. upload, then record the server id and mark it `synced`
//! 3. remove the record (photos keep their metadata with blobs released)
//! 4. on error mark it `failed` with the message and feed the breaker
//!
//! Item errors never escape the pass; only store failures while listing the
//! queue do.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::local_db::LocalStore;
use crate::remote::RemoteApi;
use crate::shared::error::{Result, SyncError};
use crate::shared::event::{SyncEvent, SyncProgress, SyncResult};
use crate::shared::record::{Category, QueuedRecord, RecordPayload, RecordStatus};
use crate::sync::broadcast::EventBus;
use crate::sync::sync_state::SyncState;

/// Single-flight token over a shared flag.
///
/// Acquiring is synchronous so a caller holds the flag before its first
/// await; dropping the guard releases it.
#[derive(Debug)]
pub struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    pub fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Trips after `threshold` consecutive failures; a success resets the count
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns true when this failure opened the breaker
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive == self.threshold
    }

    pub fn is_tripped(&self) -> bool {
        self.consecutive >= self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}

/// Sends one category of records to the server
#[async_trait]
pub trait Uploader: Send + Sync {
    fn category(&self) -> Category;

    /// Upload `record`, returning the server id when the endpoint issues one
    async fn upload(&self, store: &LocalStore, record: &QueuedRecord) -> Result<Option<String>>;
}

/// Server id for a parent reference.
///
/// Known mappings win. A parent still sitting unsynced in the local store
/// blocks the child; anything else is taken to be a server id already.
pub async fn resolve_parent(store: &LocalStore, parent_id: &str) -> Result<String> {
    if let Some(remote_id) = store.resolve_remote_id(parent_id).await? {
        return Ok(remote_id);
    }
    if let Some(parent) = store.get(parent_id).await? {
        return Err(SyncError::validation(
            "parent_id",
            format!("parent {} {} has not synced yet", parent.category, parent_id),
        ));
    }
    Ok(parent_id.to_string())
}

fn unexpected_payload(record: &QueuedRecord, expected: Category) -> SyncError {
    SyncError::validation(
        "payload",
        format!(
            "{} record {} carries a {} payload",
            expected,
            record.local_id,
            record.payload.category()
        ),
    )
}

pub struct AssessmentUploader {
    remote: Arc<dyn RemoteApi>,
}

impl AssessmentUploader {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Uploader for AssessmentUploader {
    fn category(&self) -> Category {
        Category::Assessment
    }

    async fn upload(&self, _store: &LocalStore, record: &QueuedRecord) -> Result<Option<String>> {
        let RecordPayload::Assessment(assessment) = &record.payload else {
            return Err(unexpected_payload(record, Category::Assessment));
        };
        let id = self
            .remote
            .upsert_assessment(&record.local_id, assessment)
            .await?;
        Ok(Some(id))
    }
}

pub struct DeficiencyUploader {
    remote: Arc<dyn RemoteApi>,
}

impl DeficiencyUploader {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Uploader for DeficiencyUploader {
    fn category(&self) -> Category {
        Category::Deficiency
    }

    async fn upload(&self, store: &LocalStore, record: &QueuedRecord) -> Result<Option<String>> {
        let RecordPayload::Deficiency(deficiency) = &record.payload else {
            return Err(unexpected_payload(record, Category::Deficiency));
        };
        let mut deficiency = deficiency.clone();
        deficiency.assessment_id = resolve_parent(store, &deficiency.assessment_id).await?;

        let id = self
            .remote
            .create_deficiency(&record.local_id, &deficiency)
            .await?;
        Ok(Some(id))
    }
}

pub struct PhotoUploader {
    remote: Arc<dyn RemoteApi>,
}

impl PhotoUploader {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Uploader for PhotoUploader {
    fn category(&self) -> Category {
        Category::Photo
    }

    async fn upload(&self, store: &LocalStore, record: &QueuedRecord) -> Result<Option<String>> {
        let RecordPayload::Photo(photo) = &record.payload else {
            return Err(unexpected_payload(record, Category::Photo));
        };
        let assessment_id = match &record.parent_id {
            Some(parent_id) => Some(resolve_parent(store, parent_id).await?),
            None => None,
        };

        let id = self
            .remote
            .upload_photo(&record.local_id, assessment_id.as_deref(), photo)
            .await?;
        Ok(Some(id))
    }
}

/// State of one pass across one or more categories
pub struct DrainPass<'a> {
    store: &'a LocalStore,
    breaker: CircuitBreaker,
    stop: Option<&'a AtomicBool>,
    events: Option<&'a EventBus>,
    state: Option<&'a RwLock<SyncState>>,
    progress: SyncProgress,
    aborted: bool,
}

impl<'a> DrainPass<'a> {
    pub fn new(store: &'a LocalStore, max_consecutive_failures: u32) -> Self {
        Self {
            store,
            breaker: CircuitBreaker::new(max_consecutive_failures),
            stop: None,
            events: None,
            state: None,
            progress: SyncProgress::default(),
            aborted: false,
        }
    }

    /// Consult `stop` between items
    pub fn with_stop(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Emit a progress event after every item
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Mirror progress into `state`
    pub fn with_state(mut self, state: &'a RwLock<SyncState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.progress.total = total;
        self
    }

    fn should_halt(&self) -> bool {
        self.breaker.is_tripped() || self.stop.is_some_and(|s| s.load(Ordering::Acquire))
    }

    /// Process the pending records of the uploader's category, oldest first
    pub async fn drain(&mut self, uploader: &dyn Uploader) -> Result<()> {
        let category = uploader.category();
        let pending = self.store.pending(category).await?;
        if pending.is_empty() {
            return Ok(());
        }

        self.progress.category = Some(category);
        tracing::debug!("[Sync] Draining {} pending {} record(s)", pending.len(), category);

        for record in pending {
            if self.should_halt() {
                self.aborted = true;
                break;
            }
            self.process(uploader, record).await;
        }
        Ok(())
    }

    async fn process(&mut self, uploader: &dyn Uploader, record: QueuedRecord) {
        let claimed = match self
            .store
            .update_status(&record.local_id, RecordStatus::Uploading, None)
            .await
        {
            Ok(claimed) => claimed,
            Err(SyncError::InvalidTransition { .. }) | Err(SyncError::NotFound { .. }) => {
                // Picked up or removed since the queue was listed
                tracing::debug!("[Sync] Skipping {} {}", record.category, record.local_id);
                return;
            }
            Err(e) => {
                tracing::error!("[Sync] Could not claim {}: {}", record.local_id, e);
                self.fail(&record, None).await;
                return;
            }
        };

        let outcome = match uploader.upload(self.store, &claimed).await {
            Ok(remote_id) => self.confirm(&claimed, remote_id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.breaker.record_success();
                self.progress.synced += 1;
                tracing::debug!("[Sync] Synced {} {}", claimed.category, claimed.local_id);
            }
            Err(e) => {
                tracing::warn!(
                    "[Sync] Failed to sync {} {}: {}",
                    claimed.category,
                    claimed.local_id,
                    e
                );
                if let Err(store_err) = self
                    .store
                    .update_status(&claimed.local_id, RecordStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    tracing::error!(
                        "[Sync] Could not mark {} failed: {}",
                        claimed.local_id,
                        store_err
                    );
                }
                self.fail(&claimed, Some(&e)).await;
                return;
            }
        }

        self.advance().await;
    }

    /// Record the server id, mark synced and clean up the local copy
    async fn confirm(&self, record: &QueuedRecord, remote_id: Option<String>) -> Result<()> {
        if let Some(remote_id) = remote_id {
            self.store
                .assign_remote_id(&record.local_id, &remote_id)
                .await?;
        }
        self.store
            .update_status(&record.local_id, RecordStatus::Synced, None)
            .await?;

        let cleanup = match record.category {
            Category::Photo => self.store.release_payload(&record.local_id).await,
            _ => self.store.remove(&record.local_id).await,
        };
        if let Err(e) = cleanup {
            // The server has it; a leftover synced copy is harmless
            tracing::warn!("[Sync] Cleanup of {} failed: {}", record.local_id, e);
        }
        Ok(())
    }

    async fn fail(&mut self, record: &QueuedRecord, error: Option<&SyncError>) {
        self.progress.failed += 1;
        if self.breaker.record_failure() {
            self.aborted = true;
            tracing::warn!(
                "[Sync] {} consecutive failures (last: {} {}: {}), skipping the rest of the pass",
                self.breaker.consecutive_failures(),
                record.category,
                record.local_id,
                error.map_or_else(|| "store error".to_string(), |e| e.to_string())
            );
        }
        self.advance().await;
    }

    /// Count the item as processed and publish progress
    async fn advance(&mut self) {
        self.progress.processed += 1;
        if let Some(events) = self.events {
            events.emit(SyncEvent::progress(self.progress.clone()));
        }
        if let Some(state) = self.state {
            state.write().await.progress = self.progress.clone();
        }
    }

    pub fn progress(&self) -> &SyncProgress {
        &self.progress
    }

    /// Whether the breaker or the stop signal cut the pass short
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn result(&self) -> SyncResult {
        SyncResult {
            success: self.progress.failed == 0 && !self.aborted,
            synced: self.progress.synced,
            failed: self.progress.failed,
            aborted: self.aborted,
        }
    }
}
