//! # Sync State Management
//!
//! Per-run state machine: `idle -> running -> (completed | aborted) -> idle`.
//! The engine holds a finished phase until the `complete` event is out, then
//! returns to idle; `last_result` and `last_sync` keep the outcome.

use crate::shared::event::{SyncProgress, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Running,
    /// Last pass ran to the end of the queues
    Completed,
    /// Last pass stopped early (stop signal or circuit breaker)
    Aborted,
}

#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub phase: SyncPhase,
    pub progress: SyncProgress,
    pub last_result: Option<SyncResult>,
    /// RFC3339 end time of the last pass
    pub last_sync: Option<String>,
}

impl SyncState {
    pub fn is_syncing(&self) -> bool {
        self.phase == SyncPhase::Running
    }

    pub fn begin(&mut self, total: usize) {
        self.phase = SyncPhase::Running;
        self.progress = SyncProgress {
            total,
            ..Default::default()
        };
    }

    pub fn finish(&mut self, result: &SyncResult) {
        self.phase = if result.aborted {
            SyncPhase::Aborted
        } else {
            SyncPhase::Completed
        };
        self.last_result = Some(result.clone());
        self.last_sync = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Return to idle once the finished run has been announced
    pub fn reset(&mut self) {
        if self.phase != SyncPhase::Running {
            self.phase = SyncPhase::Idle;
        }
    }

    /// Fraction of items processed, 0.0 to 1.0
    pub fn fraction(&self) -> f32 {
        if self.progress.total == 0 {
            return if self.phase == SyncPhase::Idle { 0.0 } else { 1.0 };
        }
        self.progress.processed as f32 / self.progress.total as f32
    }
}
