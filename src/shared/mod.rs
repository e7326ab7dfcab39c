//! Shared Module
//!
//! Types used by every layer of the engine: the queued record model, sync
//! events, the error type and application configuration.

/// Queued record model and storage statistics
pub mod record;

/// Sync event types
pub mod event;

/// Error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{Result, SyncError};
pub use event::{SyncEvent, SyncEventType, SyncProgress, SyncResult};
pub use record::{
    AssessmentPayload, Category, CategoryStats, DeficiencyPayload, GeoLocation, PhotoPayload,
    QueuedRecord, RecordPayload, RecordStatus, RecordingPayload, Severity, StorageStats,
};
