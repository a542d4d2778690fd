//! Engine configuration.

use core::time::Duration;
use serde::Deserialize;

/// Tunables for chunking, dispatch, and job retention.
///
/// All fields have working defaults; embedders that load configuration from
/// their own layer can deserialize this directly.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target chunk width in characters before boundary adjustment.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
    /// Upper bound on the per-batch worker count. Caller-requested
    /// concurrency is clamped to `1..=max_workers` at submission.
    pub max_workers: usize,
    /// Pause between fully-successful batches, in milliseconds. A crude
    /// guard against remote rate limiting.
    pub batch_delay_ms: u64,
    /// Retention cap for finished job records. When a new job would push
    /// the store past this bound, the oldest terminal records are evicted.
    pub max_retained_jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1100,
            chunk_overlap: 20,
            max_workers: 10,
            batch_delay_ms: 1_000,
            max_retained_jobs: 256,
        }
    }
}

impl EngineConfig {
    /// The inter-batch pause as a [`Duration`].
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}
