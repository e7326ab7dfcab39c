//! # Local Durable Store
//!
//! [`KeyObjectStore`] is the persistence seam: records keyed by `local_id`,
//! queried through a handful of secondary indexes. [`LocalStore`] layers the
//! record lifecycle on top of it (id assignment, status transitions,
//! assign-once server ids, statistics).
//!
//! Mutations are not locked at this layer; each backend serializes its own
//! writes (SQLite transactions, a mutex for the memory store).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::{LocalDatabase, LocalStore};
//! use fieldsync::shared::{AssessmentPayload, QueuedRecord, RecordPayload};
//!
//! # async fn example(payload: AssessmentPayload) -> fieldsync::shared::Result<()> {
//! let db = LocalDatabase::in_memory().await?;
//! let store = LocalStore::new(db);
//!
//! let id = store
//!     .save(QueuedRecord::new(RecordPayload::Assessment(payload)))
//!     .await?;
//! let stats = store.stats().await?;
//! assert_eq!(stats.pending, 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::shared::error::{Result, SyncError};
use crate::shared::record::{Category, QueuedRecord, RecordPayload, RecordStatus, StorageStats};

const LAST_SYNC_KEY: &str = "last_sync_time";

/// Secondary index used by [`KeyObjectStore::query_by_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIndex {
    All,
    Category(Category),
    Status(RecordStatus),
    CategoryStatus(Category, RecordStatus),
    Parent(String),
}

impl RecordIndex {
    pub fn matches(&self, record: &QueuedRecord) -> bool {
        match self {
            RecordIndex::All => true,
            RecordIndex::Category(category) => record.category == *category,
            RecordIndex::Status(status) => record.status == *status,
            RecordIndex::CategoryStatus(category, status) => {
                record.category == *category && record.status == *status
            }
            RecordIndex::Parent(parent) => record.parent_id.as_deref() == Some(parent.as_str()),
        }
    }
}

/// Persistence backend for queued records.
///
/// `query_by_index` returns records ordered by `created_at` ascending, ties
/// broken by insertion order.
#[async_trait]
pub trait KeyObjectStore: Send + Sync {
    /// Insert or replace a record by `local_id`
    async fn put(&self, record: &QueuedRecord) -> Result<()>;

    async fn get(&self, local_id: &str) -> Result<Option<QueuedRecord>>;

    /// Returns whether a record was removed
    async fn delete(&self, local_id: &str) -> Result<bool>;

    async fn query_by_index(&self, index: RecordIndex) -> Result<Vec<QueuedRecord>>;

    /// Remember the server id of a synced record
    async fn put_mapping(&self, local_id: &str, remote_id: &str) -> Result<()>;

    async fn get_mapping(&self, local_id: &str) -> Result<Option<String>>;

    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    async fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// `(category, status, count)` triples for every non-empty bucket
    async fn status_counts(&self) -> Result<Vec<(Category, RecordStatus, usize)>> {
        let records = self.query_by_index(RecordIndex::All).await?;
        let mut stats = StorageStats::default();
        for record in &records {
            stats.record(record.category, record.status);
        }
        let mut counts = Vec::new();
        for (category, bucket) in stats.categories {
            for (status, count) in [
                (RecordStatus::Pending, bucket.pending),
                (RecordStatus::Uploading, bucket.uploading),
                (RecordStatus::Synced, bucket.synced),
                (RecordStatus::Failed, bucket.failed),
            ] {
                if count > 0 {
                    counts.push((category, status, count));
                }
            }
        }
        Ok(counts)
    }
}

/// Record lifecycle operations over a [`KeyObjectStore`]
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyObjectStore>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

impl LocalStore {
    pub fn new(backend: impl KeyObjectStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn KeyObjectStore>) -> Self {
        Self { backend }
    }

    /// Write a new record as `pending`, assigning a `local_id` if it has none.
    ///
    /// An id already in the store is rejected with
    /// [`SyncError::DuplicateRecord`]; existing records only move through
    /// [`update_status`](Self::update_status). Storage failures (including
    /// quota exhaustion) are returned to the caller; a capture is never
    /// dropped silently.
    pub async fn save(&self, mut record: QueuedRecord) -> Result<String> {
        record.payload.validate()?;
        if record.local_id.is_empty() {
            record.local_id = QueuedRecord::generate_local_id();
        } else if self.backend.get(&record.local_id).await?.is_some() {
            tracing::warn!("[LocalStore] Refusing to overwrite {}", record.local_id);
            return Err(SyncError::DuplicateRecord {
                local_id: record.local_id,
            });
        }
        record.category = record.payload.category();
        record.status = RecordStatus::Pending;
        record.error_message = None;
        record.updated_at = Utc::now();

        if let Err(e) = self.backend.put(&record).await {
            tracing::error!(
                "[LocalStore] Failed to save {} {}: {}",
                record.category,
                record.local_id,
                e
            );
            return Err(e);
        }
        tracing::debug!("[LocalStore] Saved {} {}", record.category, record.local_id);
        Ok(record.local_id)
    }

    pub async fn get(&self, local_id: &str) -> Result<Option<QueuedRecord>> {
        self.backend.get(local_id).await
    }

    async fn require(&self, local_id: &str) -> Result<QueuedRecord> {
        self.backend
            .get(local_id)
            .await?
            .ok_or_else(|| SyncError::not_found(local_id))
    }

    /// Records belonging to a logical parent, oldest first
    pub async fn get_by_parent(&self, parent_id: &str) -> Result<Vec<QueuedRecord>> {
        self.backend
            .query_by_index(RecordIndex::Parent(parent_id.to_string()))
            .await
    }

    /// Move a record to `status`.
    ///
    /// Rejects transitions outside the lifecycle (see
    /// [`RecordStatus::can_transition_to`]); `failed` needs a message.
    pub async fn update_status(
        &self,
        local_id: &str,
        status: RecordStatus,
        error: Option<&str>,
    ) -> Result<QueuedRecord> {
        let mut record = self.require(local_id).await?;

        if !record.status.can_transition_to(status) {
            return Err(SyncError::InvalidTransition {
                local_id: local_id.to_string(),
                from: record.status,
                to: status,
            });
        }

        match status {
            RecordStatus::Failed => {
                let message = error
                    .filter(|m| !m.trim().is_empty())
                    .ok_or_else(|| {
                        SyncError::validation("error_message", "failed status requires an error message")
                    })?;
                record.error_message = Some(message.to_string());
            }
            RecordStatus::Uploading => {
                record.attempts += 1;
            }
            RecordStatus::Pending | RecordStatus::Synced => {
                record.error_message = None;
            }
        }

        record.status = status;
        record.updated_at = Utc::now();
        self.backend.put(&record).await?;
        Ok(record)
    }

    /// Set the server id. A second call with the same id is a no-op, a
    /// different id is a [`SyncError::RemoteIdConflict`].
    pub async fn assign_remote_id(&self, local_id: &str, remote_id: &str) -> Result<QueuedRecord> {
        let mut record = self.require(local_id).await?;
        match &record.remote_id {
            Some(existing) if existing == remote_id => return Ok(record),
            Some(existing) => {
                return Err(SyncError::RemoteIdConflict {
                    local_id: local_id.to_string(),
                    existing: existing.clone(),
                    attempted: remote_id.to_string(),
                })
            }
            None => {}
        }

        record.remote_id = Some(remote_id.to_string());
        record.updated_at = Utc::now();
        self.backend.put(&record).await?;
        self.backend.put_mapping(local_id, remote_id).await?;
        Ok(record)
    }

    /// Delete a record; absent ids are fine
    pub async fn remove(&self, local_id: &str) -> Result<()> {
        if self.backend.delete(local_id).await? {
            tracing::debug!("[LocalStore] Removed {}", local_id);
        }
        Ok(())
    }

    /// Counts per category and status
    pub async fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        for (category, status, count) in self.backend.status_counts().await? {
            stats.add(category, status, count);
        }
        Ok(stats)
    }

    /// Pending records of a category, oldest first
    pub async fn pending(&self, category: Category) -> Result<Vec<QueuedRecord>> {
        self.by_status(category, RecordStatus::Pending).await
    }

    pub async fn by_status(&self, category: Category, status: RecordStatus) -> Result<Vec<QueuedRecord>> {
        self.backend
            .query_by_index(RecordIndex::CategoryStatus(category, status))
            .await
    }

    pub async fn all(&self, category: Category) -> Result<Vec<QueuedRecord>> {
        self.backend.query_by_index(RecordIndex::Category(category)).await
    }

    /// `failed -> pending` for one category or all of them
    pub async fn reset_failed(&self, category: Option<Category>) -> Result<usize> {
        let index = match category {
            Some(category) => RecordIndex::CategoryStatus(category, RecordStatus::Failed),
            None => RecordIndex::Status(RecordStatus::Failed),
        };
        let failed = self.backend.query_by_index(index).await?;
        for record in &failed {
            self.update_status(&record.local_id, RecordStatus::Pending, None)
                .await?;
        }
        if !failed.is_empty() {
            tracing::info!("[LocalStore] Reset {} failed record(s) to pending", failed.len());
        }
        Ok(failed.len())
    }

    /// `uploading -> pending` for records whose upload outcome is unknown
    /// (process exit mid-flight). Remote upserts are keyed by `local_id`, so
    /// re-sending them is safe.
    pub async fn recover_in_flight(&self) -> Result<usize> {
        let in_flight = self
            .backend
            .query_by_index(RecordIndex::Status(RecordStatus::Uploading))
            .await?;
        for record in &in_flight {
            self.update_status(&record.local_id, RecordStatus::Pending, None)
                .await?;
        }
        if !in_flight.is_empty() {
            tracing::warn!(
                "[LocalStore] {} record(s) were in flight; marked pending for re-validation",
                in_flight.len()
            );
        }
        Ok(in_flight.len())
    }

    /// Drop the binary payload of a synced photo, keeping its metadata
    pub async fn release_payload(&self, local_id: &str) -> Result<()> {
        let mut record = self.require(local_id).await?;
        if let RecordPayload::Photo(photo) = &mut record.payload {
            photo.data = Vec::new();
            photo.original = None;
            record.updated_at = Utc::now();
            self.backend.put(&record).await?;
        }
        Ok(())
    }

    /// Delete every synced record, returns how many went
    pub async fn purge_synced(&self) -> Result<usize> {
        let synced = self
            .backend
            .query_by_index(RecordIndex::Status(RecordStatus::Synced))
            .await?;
        for record in &synced {
            self.backend.delete(&record.local_id).await?;
        }
        Ok(synced.len())
    }

    /// Server id for a parent reference that may be a local id
    pub async fn resolve_remote_id(&self, id: &str) -> Result<Option<String>> {
        if let Some(remote) = self.backend.get_mapping(id).await? {
            return Ok(Some(remote));
        }
        Ok(self.backend.get(id).await?.and_then(|r| r.remote_id))
    }

    pub async fn last_sync_time(&self) -> Result<Option<String>> {
        self.backend.get_meta(LAST_SYNC_KEY).await
    }

    pub async fn set_last_sync_time(&self) -> Result<()> {
        self.backend
            .set_meta(LAST_SYNC_KEY, &Utc::now().to_rfc3339())
            .await
    }
}
