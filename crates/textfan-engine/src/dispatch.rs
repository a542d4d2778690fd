//! Batched concurrent chunk dispatch.
//!
//! One detached task runs per job. It splits the input, fans each batch of
//! chunks out as concurrent tasks against the completion backend, records
//! results into the job store as they arrive (in arbitrary completion
//! order, keyed by chunk index), and reassembles the final output in
//! original index order once every batch has succeeded.
//!
//! ## Failure policy
//!
//! Fail-fast: the first failed chunk aborts the job. Remaining in-flight
//! tasks of the batch are aborted, no later batch is dispatched, and the
//! store keeps every result written so far alongside the failure message.
//! There are no retries.
//!
//! ## Pacing
//!
//! Between fully-successful non-final batches the task sleeps for the
//! configured inter-batch delay, a crude guard against remote rate limits.

use crate::client::CompletionBackend;
use crate::config::EngineConfig;
use crate::store::JobStore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use textfan_core::chunker;

/// Inputs for one background job task.
pub(crate) struct JobParams {
    pub session_id: String,
    pub text: String,
    pub instruction: String,
    /// Per-batch concurrency. Values below 1 are treated as 1.
    pub workers: usize,
}

/// Spawns the job's background task and returns immediately.
pub(crate) fn spawn_job<C: CompletionBackend>(
    store: Arc<JobStore>,
    backend: Arc<C>,
    config: EngineConfig,
    params: JobParams,
) {
    tokio::spawn(run_job(store, backend, config, params));
}

/// Runs one job to completion or first failure.
///
/// The record for `params.session_id` must already exist with status
/// `Splitting`; this task is its only writer.
pub(crate) async fn run_job<C: CompletionBackend>(
    store: Arc<JobStore>,
    backend: Arc<C>,
    config: EngineConfig,
    params: JobParams,
) {
    let session_id = params.session_id;

    let chunks = chunker::split(&params.text, config.chunk_size, config.chunk_overlap);
    let total = chunks.len();
    store.begin_processing(&session_id, total);
    tracing::info!(session_id = %session_id, total_chunks = total, "job processing started");

    if total == 0 {
        // All-whitespace input splits to nothing; that is an immediately
        // completed job, not a failure.
        store.mark_completed(&session_id, String::new());
        return;
    }

    let workers = params.workers.max(1);
    let instruction = Arc::new(params.instruction);
    let mut results: Vec<Option<String>> = vec![None; total];

    let batches = partition(chunks, workers);
    let last_batch = batches.len() - 1;

    for (batch_no, batch) in batches.into_iter().enumerate() {
        tracing::debug!(session_id = %session_id, batch_no, size = batch.len(), "dispatching batch");

        // Start every chunk task in the batch before awaiting any of them.
        let mut inflight = FuturesUnordered::new();
        for (index, chunk) in batch {
            let backend = Arc::clone(&backend);
            let instruction = Arc::clone(&instruction);
            inflight.push(tokio::spawn(async move {
                let outcome = backend.complete(&instruction, &chunk).await;
                (index, outcome)
            }));
        }

        // Drain completions in whatever order they finish; slot writes are
        // keyed by index so reassembly stays order-correct.
        while let Some(joined) = inflight.next().await {
            let (index, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    for handle in inflight.iter() {
                        handle.abort();
                    }
                    tracing::warn!(session_id = %session_id, "chunk task failed: {e}");
                    store.mark_error(&session_id, format!("chunk task failed: {e}"));
                    return;
                }
            };
            match outcome {
                Ok(text) => {
                    store.record_chunk_result(&session_id, index, text.clone());
                    results[index] = Some(text);
                }
                Err(err) => {
                    for handle in inflight.iter() {
                        handle.abort();
                    }
                    tracing::warn!(
                        session_id = %session_id,
                        index,
                        error = %err,
                        "chunk completion failed; aborting job"
                    );
                    store.mark_error(&session_id, err.to_string());
                    return;
                }
            }
        }

        if batch_no != last_batch {
            tokio::time::sleep(config.batch_delay()).await;
        }
    }

    let output = results
        .iter()
        .flatten()
        .map(String::as_str)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    store.mark_completed(&session_id, output);
    tracing::info!(session_id = %session_id, total_chunks = total, "job completed");
}

/// Partitions indexed chunks into consecutive batches of at most `workers`
/// entries; the last batch may be smaller.
fn partition(chunks: Vec<String>, workers: usize) -> Vec<Vec<(usize, String)>> {
    let mut batches = Vec::with_capacity(chunks.len().div_ceil(workers));
    let mut batch = Vec::with_capacity(workers);
    for indexed in chunks.into_iter().enumerate() {
        batch.push(indexed);
        if batch.len() == workers {
            batches.push(std::mem::replace(&mut batch, Vec::with_capacity(workers)));
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use parking_lot::Mutex;
    use textfan_core::{Error, JobStatus, Result};

    /// Deterministic in-process backend: echoes chunks, optionally slows
    /// down or fails chunks whose text contains a marker, and records
    /// every dispatched chunk.
    struct MockBackend {
        calls: Mutex<Vec<String>>,
        delays: Vec<(&'static str, Duration)>,
        fail_marker: Option<&'static str>,
    }

    impl MockBackend {
        fn echo() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                delays: Vec::new(),
                fail_marker: None,
            }
        }

        fn dispatched(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl CompletionBackend for MockBackend {
        async fn complete(&self, _instruction: &str, chunk_text: &str) -> Result<String> {
            self.calls.lock().push(chunk_text.to_owned());
            for (marker, delay) in &self.delays {
                if chunk_text.contains(marker) {
                    tokio::time::sleep(*delay).await;
                }
            }
            if let Some(marker) = self.fail_marker {
                if chunk_text.contains(marker) {
                    return Err(Error::remote(format!("injected failure in {chunk_text}")));
                }
            }
            Ok(format!("processed {chunk_text}"))
        }

        async fn verify(&self) -> Result<()> {
            Ok(())
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            chunk_size: 8,
            chunk_overlap: 0,
            batch_delay_ms: 0,
            ..EngineConfig::default()
        }
    }

    /// `n` seven-character sentences ("part00。" ...) that the chunker cuts
    /// into exactly one chunk each under `test_config`.
    fn sentences(n: usize) -> String {
        (0..n).map(|i| format!("part{i:02}。")).collect()
    }

    fn params(session_id: &str, text: String, workers: usize) -> JobParams {
        JobParams {
            session_id: session_id.to_owned(),
            text,
            instruction: "Summarize".to_owned(),
            workers,
        }
    }

    #[test]
    fn partition_sizes() {
        let chunks: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let batches = partition(chunks, 5);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(batches[2][0].0, 10);
        assert_eq!(batches[2][1].0, 11);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reassembles_in_index_order_despite_completion_order() {
        let store = Arc::new(JobStore::new(8));
        let backend = Arc::new(MockBackend {
            // First chunk finishes last within its batch.
            delays: vec![
                ("part00", Duration::from_millis(60)),
                ("part01", Duration::from_millis(30)),
            ],
            ..MockBackend::echo()
        });

        store.create("job").unwrap();
        run_job(
            Arc::clone(&store),
            backend,
            test_config(),
            params("job", sentences(3), 3),
        )
        .await;

        let snap = store.snapshot("job").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.completed_chunks, 3);
        assert_eq!(
            snap.output.as_deref(),
            Some("processed part00。\n\nprocessed part01。\n\nprocessed part02。")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_aborts_job_and_preserves_prior_results() {
        let store = Arc::new(JobStore::new(8));
        let backend = Arc::new(MockBackend {
            fail_marker: Some("part07"),
            // Everything else in the failing batch is slow enough that the
            // failure is detected first.
            delays: (5..10)
                .filter(|&i| i != 7)
                .map(|i| {
                    let marker: &'static str = Box::leak(format!("part{i:02}").into_boxed_str());
                    (marker, Duration::from_millis(100))
                })
                .collect(),
            ..MockBackend::echo()
        });

        store.create("job").unwrap();
        run_job(
            Arc::clone(&store),
            Arc::clone(&backend),
            test_config(),
            params("job", sentences(12), 5),
        )
        .await;

        let snap = store.snapshot("job").unwrap();
        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains("part07"));
        assert_eq!(snap.total_chunks, 12);

        // The whole first batch survived.
        assert_eq!(snap.completed_chunks, 5);
        for index in 0..5 {
            assert_eq!(
                snap.results[index].as_deref(),
                Some(format!("processed part{index:02}。").as_str())
            );
        }

        // The second batch was dispatched in full, the third never was.
        let dispatched = backend.dispatched();
        assert_eq!(dispatched.len(), 10);
        assert!(!dispatched.iter().any(|c| c.contains("part10")));
        assert!(!dispatched.iter().any(|c| c.contains("part11")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn whitespace_input_completes_immediately() {
        let store = Arc::new(JobStore::new(8));
        let backend = Arc::new(MockBackend::echo());

        store.create("job").unwrap();
        run_job(
            Arc::clone(&store),
            Arc::clone(&backend),
            test_config(),
            params("job", "  \n\n \t ".to_owned(), 4),
        )
        .await;

        let snap = store.snapshot("job").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.total_chunks, 0);
        assert_eq!(snap.output.as_deref(), Some(""));
        assert!(backend.dispatched().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_workers_are_treated_as_one() {
        let store = Arc::new(JobStore::new(8));
        let backend = Arc::new(MockBackend::echo());

        store.create("job").unwrap();
        run_job(
            Arc::clone(&store),
            backend,
            test_config(),
            params("job", sentences(3), 0),
        )
        .await;

        let snap = store.snapshot("job").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.completed_chunks, 3);
    }
}
