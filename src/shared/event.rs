/**
 * Sync Event System
 *
 * Event types emitted by the sync engine. UI state and the notification
 * layer subscribe to these instead of polling the store.
 */
use serde::{Deserialize, Serialize};

use crate::shared::record::Category;

/// Type of sync event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    /// A drain pass began
    Start,
    /// An item finished (either way)
    Progress,
    /// The pass finished, `result` is set
    Complete,
    /// The pass could not run or was rejected
    Error,
}

/// Progress counters within a running pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncProgress {
    /// Items known at the start of the pass
    pub total: usize,
    /// Items attempted so far
    pub processed: usize,
    pub synced: usize,
    pub failed: usize,
    /// Category currently draining
    pub category: Option<Category>,
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResult {
    /// No item failed during the pass
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    /// Pass ended early (stop signal or circuit breaker)
    pub aborted: bool,
}

impl SyncResult {
    pub fn total(&self) -> usize {
        self.synced + self.failed
    }

    /// Some items synced and some failed
    pub fn is_partial(&self) -> bool {
        self.synced > 0 && self.failed > 0
    }
}

/// Event delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    pub progress: Option<SyncProgress>,
    pub result: Option<SyncResult>,
    pub message: Option<String>,
    /// RFC3339 timestamp
    pub timestamp: String,
}

impl SyncEvent {
    fn new(event_type: SyncEventType) -> Self {
        Self {
            event_type,
            progress: None,
            result: None,
            message: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a start event
    pub fn start(total: usize) -> Self {
        Self {
            progress: Some(SyncProgress {
                total,
                ..Default::default()
            }),
            ..Self::new(SyncEventType::Start)
        }
    }

    /// Create a progress event
    pub fn progress(progress: SyncProgress) -> Self {
        Self {
            progress: Some(progress),
            ..Self::new(SyncEventType::Progress)
        }
    }

    /// Create a completion event
    pub fn complete(result: SyncResult) -> Self {
        Self {
            result: Some(result),
            ..Self::new(SyncEventType::Complete)
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(SyncEventType::Error)
        }
    }
}
