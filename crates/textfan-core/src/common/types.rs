//! Shared job lifecycle types.
//!
//! This module defines the types exchanged between the dispatch engine and
//! status pollers. A job moves through [`JobStatus`] monotonically —
//! `Splitting → Processing → (Completed | Error)` — and is only ever
//! observed from the outside as an immutable [`JobSnapshot`] copy, so a
//! concurrent poll can never see a record mid-mutation.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a processing job.
///
/// Transitions are strictly monotonic: `Splitting → Processing` and
/// `Processing → Completed` or `Processing → Error`. No transition leaves
/// `Completed` or `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The input text is being partitioned into chunks.
    Splitting,
    /// Chunk completions are being dispatched and collected.
    Processing,
    /// Every chunk completed and the joined output is available.
    Completed,
    /// A chunk completion failed; the job is permanently aborted.
    Error,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// A point-in-time, immutable view of one job record.
///
/// Returned by status polls. `results` holds one slot per chunk in original
/// index order; a slot is `None` until that chunk's completion arrives.
/// `output` is only populated on successful completion and contains the
/// non-empty slots joined with a blank line, in index order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Percentage complete, `floor(100 * completed_chunks / total_chunks)`;
    /// 0 while the chunk count is still unknown.
    pub progress: u8,
    /// Number of chunks produced by splitting; 0 until splitting finishes.
    pub total_chunks: usize,
    /// Number of chunk completions recorded so far. Non-decreasing.
    pub completed_chunks: usize,
    /// Per-chunk completion slots, in original index order.
    pub results: Vec<Option<String>>,
    /// Final joined output; present only when `status` is `Completed`.
    pub output: Option<String>,
    /// Failure message; present only when `status` is `Error`.
    pub error: Option<String>,
}

/// Liveness report returned by the service's health probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `"healthy"` while the process is able to respond.
    pub status: String,
    /// Unix timestamp (seconds) at which the probe was answered.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Splitting).unwrap(),
            "\"splitting\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Splitting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }
}
