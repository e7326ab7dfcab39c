//! Sync Error Types
//!
//! This module defines the error type shared by every layer of the offline
//! capture and synchronization engine.
//!
//! # Error Categories
//!
//! - `Storage` / `QuotaExceeded` - durable store read/write failures. These
//!   propagate to the capture call that triggered them.
//! - `Network` - upload and transcription failures. Recorded on the queue
//!   item as `failed`; never escape a drain pass.
//! - `Compression` - non-fatal, the original photo is queued instead.
//! - `Permission` - notification/geolocation denials, degrade to disabled.
//! - `InvalidTransition` / `RemoteIdConflict` - record lifecycle violations.
//!
//! # Usage
//!
//! ```rust
//! use fieldsync::shared::error::SyncError;
//!
//! let error = SyncError::validation("condition_rating", "must be between 1 and 5");
//! assert!(error.to_string().contains("condition_rating"));
//! ```
use crate::shared::record::RecordStatus;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the store, the sync engine and their collaborators
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Durable store read or write failure
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// Durable store is out of space
    #[error("Storage quota exceeded: {message}")]
    QuotaExceeded {
        /// Human-readable error message
        message: String,
    },

    /// Upload, transcription or other remote call failure
    #[error("Network error: {message}")]
    Network {
        /// HTTP status code when the server answered
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },

    /// Photo compression failure
    #[error("Compression error: {message}")]
    Compression {
        /// Human-readable error message
        message: String,
    },

    /// A platform permission (notifications, geolocation) was not granted
    #[error("Permission '{permission}' unavailable: {message}")]
    Permission {
        /// Permission name
        permission: String,
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Disallowed record status change
    #[error("Invalid status transition for {local_id}: {from} -> {to}")]
    InvalidTransition {
        /// Record identifier
        local_id: String,
        /// Current status
        from: RecordStatus,
        /// Requested status
        to: RecordStatus,
    },

    /// Record does not exist in the store
    #[error("Record not found: {local_id}")]
    NotFound {
        /// Record identifier
        local_id: String,
    },

    /// `save` with a `local_id` the store already holds
    #[error("Record already exists: {local_id}")]
    DuplicateRecord {
        /// Record identifier
        local_id: String,
    },

    /// Attempt to replace an already assigned server id
    #[error("Remote id already assigned for {local_id}: {existing} (attempted {attempted})")]
    RemoteIdConflict {
        /// Record identifier
        local_id: String,
        /// Id recorded on the first assignment
        existing: String,
        /// Id the caller tried to set
        attempted: String,
    },

    /// A drain pass is already running
    #[error("Sync already in progress")]
    AlreadyRunning,

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new quota error
    pub fn quota(message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
        }
    }

    /// Create a network error without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Create a network error for a non-success HTTP response
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a new compression error
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a new permission error
    pub fn permission(permission: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permission {
            permission: permission.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(local_id: impl Into<String>) -> Self {
        Self::NotFound {
            local_id: local_id.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether the error came from the durable store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::QuotaExceeded { .. })
    }

    /// Whether the error came from a remote call
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLITE_FULL
            if db_err.code().as_deref() == Some("13") {
                return Self::quota(db_err.message().to_string());
            }
        }
        Self::storage(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::network(err.to_string()),
        }
    }
}

impl From<image::ImageError> for SyncError {
    fn from(err: image::ImageError) -> Self {
        Self::compression(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("I/O error: {}", err))
    }
}

impl From<crate::shared::config::ConfigError> for SyncError {
    fn from(err: crate::shared::config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
