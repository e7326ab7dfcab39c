//! Database Schema Definitions
//!
//! Contains schema-related constants and the statements for each migration.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Schema migration versions
pub const MIGRATION_VERSIONS: &[i32] = &[1, 2];

/// Version 1: record queue, id mappings, metadata
const MIGRATION_1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS queued_records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        local_id TEXT NOT NULL UNIQUE,
        remote_id TEXT,
        category TEXT NOT NULL,
        parent_id TEXT,
        status TEXT NOT NULL,
        error_message TEXT,
        attempts INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL,
        data BLOB,
        original_data BLOB,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS id_mappings (
        local_id TEXT PRIMARY KEY,
        remote_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

/// Version 2: indexes backing `query_by_index`
const MIGRATION_2: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_category_status
        ON queued_records (category, status, created_at, seq)",
    "CREATE INDEX IF NOT EXISTS idx_records_status ON queued_records (status)",
    "CREATE INDEX IF NOT EXISTS idx_records_parent
        ON queued_records (parent_id, created_at, seq)",
];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<i32> {
    MIGRATION_VERSIONS
        .iter()
        .filter(|&&v| v > current_version)
        .cloned()
        .collect()
}

/// Statements for one migration version
pub fn migration_statements(version: i32) -> &'static [&'static str] {
    match version {
        1 => MIGRATION_1,
        2 => MIGRATION_2,
        _ => &[],
    }
}
