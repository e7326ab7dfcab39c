//! # Queued Record Persistence
//!
//! [`KeyObjectStore`] over the `queued_records`, `id_mappings` and
//! `sync_metadata` tables.
//!
//! The JSON payload document lives in `payload`; photo and audio bytes go to
//! the `data` / `original_data` BLOB columns so listing queries can stay
//! cheap. Timestamps are stored as microseconds since the epoch and `seq`
//! breaks ties between records created in the same microsecond.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::local_db::store::{KeyObjectStore, RecordIndex};
use crate::local_db::LocalDatabase;
use crate::shared::error::{Result, SyncError};
use crate::shared::record::{Category, QueuedRecord, RecordPayload, RecordStatus};

const SELECT_RECORD: &str = "SELECT local_id, remote_id, category, parent_id, status, error_message,
        attempts, payload, data, original_data, created_at, updated_at
     FROM queued_records";

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| SyncError::storage(format!("timestamp out of range: {}", micros)))
}

fn record_from_row(row: &SqliteRow) -> Result<QueuedRecord> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let payload_json: String = row.try_get("payload")?;
    let data: Option<Vec<u8>> = row.try_get("data")?;
    let original: Option<Vec<u8>> = row.try_get("original_data")?;
    let attempts: i64 = row.try_get("attempts")?;

    let mut payload: RecordPayload = serde_json::from_str(&payload_json)?;
    payload.attach_blobs(data, original);

    Ok(QueuedRecord {
        local_id: row.try_get("local_id")?,
        remote_id: row.try_get("remote_id")?,
        category: category.parse::<Category>()?,
        parent_id: row.try_get("parent_id")?,
        payload,
        status: status.parse::<RecordStatus>()?,
        error_message: row.try_get("error_message")?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        created_at: micros_to_datetime(row.try_get("created_at")?)?,
        updated_at: micros_to_datetime(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl KeyObjectStore for LocalDatabase {
    async fn put(&self, record: &QueuedRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let (data, original) = record.payload.blobs();

        // Upsert keeps `seq` of an existing row, so FIFO order is stable
        sqlx::query(
            "INSERT INTO queued_records
                (local_id, remote_id, category, parent_id, status, error_message,
                 attempts, payload, data, original_data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(local_id) DO UPDATE SET
                remote_id = excluded.remote_id,
                category = excluded.category,
                parent_id = excluded.parent_id,
                status = excluded.status,
                error_message = excluded.error_message,
                attempts = excluded.attempts,
                payload = excluded.payload,
                data = excluded.data,
                original_data = excluded.original_data,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )
        .bind(&record.local_id)
        .bind(&record.remote_id)
        .bind(record.category.as_str())
        .bind(&record.parent_id)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(i64::from(record.attempts))
        .bind(&payload)
        .bind(data)
        .bind(original)
        .bind(record.created_at.timestamp_micros())
        .bind(record.updated_at.timestamp_micros())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get(&self, local_id: &str) -> Result<Option<QueuedRecord>> {
        let row = sqlx::query(&format!("{} WHERE local_id = ?", SELECT_RECORD))
            .bind(local_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete(&self, local_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queued_records WHERE local_id = ?")
            .bind(local_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_by_index(&self, index: RecordIndex) -> Result<Vec<QueuedRecord>> {
        const ORDER: &str = "ORDER BY created_at ASC, seq ASC";

        let rows = match &index {
            RecordIndex::All => {
                sqlx::query(&format!("{} {}", SELECT_RECORD, ORDER))
                    .fetch_all(self.pool())
                    .await?
            }
            RecordIndex::Category(category) => {
                sqlx::query(&format!("{} WHERE category = ? {}", SELECT_RECORD, ORDER))
                    .bind(category.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
            RecordIndex::Status(status) => {
                sqlx::query(&format!("{} WHERE status = ? {}", SELECT_RECORD, ORDER))
                    .bind(status.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
            RecordIndex::CategoryStatus(category, status) => {
                sqlx::query(&format!(
                    "{} WHERE category = ? AND status = ? {}",
                    SELECT_RECORD, ORDER
                ))
                .bind(category.as_str())
                .bind(status.as_str())
                .fetch_all(self.pool())
                .await?
            }
            RecordIndex::Parent(parent_id) => {
                sqlx::query(&format!("{} WHERE parent_id = ? {}", SELECT_RECORD, ORDER))
                    .bind(parent_id)
                    .fetch_all(self.pool())
                    .await?
            }
        };

        rows.iter().map(record_from_row).collect()
    }

    async fn put_mapping(&self, local_id: &str, remote_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO id_mappings (local_id, remote_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(local_id)
        .bind(remote_id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_mapping(&self, local_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT remote_id FROM id_mappings WHERE local_id = ?")
            .bind(local_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.try_get::<String, _>("remote_id")).transpose()?)
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.try_get::<String, _>("value")).transpose()?)
    }

    async fn status_counts(&self) -> Result<Vec<(Category, RecordStatus, usize)>> {
        let rows = sqlx::query(
            "SELECT category, status, COUNT(*) AS count
             FROM queued_records
             GROUP BY category, status",
        )
        .fetch_all(self.pool())
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.try_get("category")?;
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            counts.push((
                category.parse()?,
                status.parse()?,
                usize::try_from(count).unwrap_or(0),
            ));
        }
        Ok(counts)
    }
}
