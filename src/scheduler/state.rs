//! Per-job states, progress events, and the run summary.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of one clone job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for an admission permit
    #[default]
    Pending,
    /// Destination being cleared and recreated
    Preparing,
    /// Transfer in progress
    Cloning,
    /// Clone finished
    Completed,
    /// Remote had no history; not an error
    SkippedEmpty,
    /// Clone failed; fails the run
    Failed { error: String },
}

/// Events emitted while the scheduler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CloneEvent {
    /// A job was admitted.
    Started { full_name: String },
    /// A job moved to a non-terminal state.
    StatusChanged { full_name: String, status: JobStatus },
    /// A job reached a terminal state. Emitted exactly once per admitted job.
    Finished { full_name: String, status: JobStatus },
}

/// Counts for a finished (or aborted) scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub skipped_empty: usize,
    pub failed: usize,
    /// Jobs never admitted because the run stopped early
    pub not_started: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count a terminal status. Non-terminal statuses are ignored.
    pub fn record(&mut self, status: &JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::SkippedEmpty => self.skipped_empty += 1,
            JobStatus::Failed { .. } => self.failed += 1,
            _ => {}
        }
    }

    pub fn settled(&self) -> usize {
        self.completed + self.skipped_empty + self.failed
    }

    pub fn all_success(&self) -> bool {
        self.failed == 0 && self.not_started == 0
    }
}
