//! # Sync Metrics
//!
//! Per-run durations and item totals, accumulated for diagnostics.

use std::time::{Duration, Instant};

use crate::shared::event::SyncResult;

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_runs: u64,
    /// Runs where no item failed
    pub successful_runs: u64,
    pub aborted_runs: u64,
    pub items_synced: u64,
    pub items_failed: u64,
    pub average_run_duration: Duration,
    pub last_run_duration: Option<Duration>,
    completed_runs: u64,
    last_run_start: Option<Instant>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_start(&mut self) {
        self.last_run_start = Some(Instant::now());
        self.total_runs += 1;
    }

    pub fn record_run_end(&mut self, result: &SyncResult) {
        let duration = self
            .last_run_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();

        self.last_run_duration = Some(duration);
        self.items_synced += result.synced as u64;
        self.items_failed += result.failed as u64;
        if result.aborted {
            self.aborted_runs += 1;
        } else if result.success {
            self.successful_runs += 1;
        }

        // Update rolling average
        self.completed_runs += 1;
        let previous = u32::try_from(self.completed_runs - 1).unwrap_or(u32::MAX);
        let total_duration = self.average_run_duration * previous + duration;
        self.average_run_duration = total_duration / previous.saturating_add(1);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.successful_runs as f64 / self.total_runs as f64
        }
    }
}
