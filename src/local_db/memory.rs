//! In-memory key-object store.
//!
//! Used for ephemeral sessions and tests. An optional byte quota makes it
//! reject writes the way a full browser or device store would.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::local_db::store::{KeyObjectStore, RecordIndex};
use crate::shared::error::{Result, SyncError};
use crate::shared::record::QueuedRecord;

#[derive(Debug, Default)]
struct Inner {
    /// local_id -> (insertion sequence, record)
    records: HashMap<String, (u64, QueuedRecord)>,
    next_seq: u64,
    used_bytes: usize,
    mappings: HashMap<String, String>,
    meta: HashMap<String, String>,
}

/// Volatile [`KeyObjectStore`] backed by hash maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would grow stored payloads past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            inner: RwLock::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub async fn used_bytes(&self) -> usize {
        self.inner.read().await.used_bytes
    }
}

fn stored_size(record: &QueuedRecord) -> usize {
    let document = serde_json::to_vec(&record.payload).map_or(0, |v| v.len());
    document + record.payload.size_hint()
}

#[async_trait]
impl KeyObjectStore for MemoryStore {
    async fn put(&self, record: &QueuedRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let new_size = stored_size(record);
        let old_size = inner
            .records
            .get(&record.local_id)
            .map_or(0, |(_, existing)| stored_size(existing));
        let projected = inner.used_bytes - old_size + new_size;

        if let Some(quota) = self.quota_bytes {
            if projected > quota {
                return Err(SyncError::quota(format!(
                    "writing {} needs {} bytes, quota is {}",
                    record.local_id, projected, quota
                )));
            }
        }

        let existing_seq = inner.records.get(&record.local_id).map(|(seq, _)| *seq);
        let seq = match existing_seq {
            Some(seq) => seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            }
        };
        inner
            .records
            .insert(record.local_id.clone(), (seq, record.clone()));
        inner.used_bytes = projected;
        Ok(())
    }

    async fn get(&self, local_id: &str) -> Result<Option<QueuedRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(local_id).map(|(_, r)| r.clone()))
    }

    async fn delete(&self, local_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.records.remove(local_id) {
            Some((_, record)) => {
                inner.used_bytes -= stored_size(&record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query_by_index(&self, index: RecordIndex) -> Result<Vec<QueuedRecord>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&(u64, QueuedRecord)> = inner
            .records
            .values()
            .filter(|(_, record)| index.matches(record))
            .collect();
        matches.sort_by(|(seq_a, a), (seq_b, b)| {
            a.created_at.cmp(&b.created_at).then(seq_a.cmp(seq_b))
        });
        Ok(matches.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn put_mapping(&self, local_id: &str, remote_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .mappings
            .insert(local_id.to_string(), remote_id.to_string());
        Ok(())
    }

    async fn get_mapping(&self, local_id: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.mappings.get(local_id).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.meta.get(key).cloned())
    }
}
