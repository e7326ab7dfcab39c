//! # Local Database Module
//!
//! Durable client-side storage for captures waiting to be synchronized.
//!
//! ## Architecture
//!
//! - **`store`**: the [`KeyObjectStore`] seam and the [`LocalStore`] record
//!   lifecycle API built on it
//! - **`records`**: `KeyObjectStore` over SQLite (this module's
//!   [`LocalDatabase`])
//! - **`memory`**: volatile `KeyObjectStore` with an optional quota
//! - **`schema`**: schema versions and migration statements
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::{LocalDatabase, LocalStore};
//!
//! # async fn example() -> fieldsync::shared::Result<()> {
//! let db = LocalDatabase::open("/tmp/fieldsync/local.db").await?;
//! let store = LocalStore::new(db);
//! println!("{:?}", store.stats().await?);
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod records;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use store::{KeyObjectStore, LocalStore, RecordIndex};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::shared::error::Result;

/// Local database connection manager
///
/// Manages the SQLite connection pool and schema. Record operations live in
/// `records.rs` as the [`KeyObjectStore`] implementation.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode so readers (stats, UI queries) do not block the drain
    /// pass writing status updates.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA temp_store=MEMORY").execute(&pool).await?;

        let db = Self { pool };
        db.init_schema().await?;

        tracing::info!("[LocalDb] Opened {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, gone when the value is dropped
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize database schema
    ///
    /// Creates the migrations table and applies any pending migrations.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.schema_version().await?;
        for version in schema::get_pending_migrations(current_version) {
            self.apply_migration(version).await?;
        }

        Ok(())
    }

    /// Highest applied migration, 0 for a fresh file
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Run one migration and record it, atomically
    async fn apply_migration(&self, version: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in schema::migration_statements(version) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("[LocalDb] Applied migration {}", version);
        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
