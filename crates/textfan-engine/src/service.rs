//! Boundary facade for the job engine.
//!
//! [`TextService`] exposes the four operations an embedding transport maps
//! onto routes: submit a job, poll its status, verify a credential, and
//! answer a health probe. Submission validates inputs and verifies the
//! credential synchronously — failing fast before any job record exists —
//! then spawns the job's background task and returns its session
//! identifier immediately.

use crate::client::{CompletionBackend, CompletionConnector, DEFAULT_MODEL};
use crate::config::EngineConfig;
use crate::dispatch::{self, JobParams};
use crate::store::JobStore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use textfan_core::{Error, HealthReport, JobSnapshot, Result};

/// Default per-batch concurrency when a request does not choose one.
pub const DEFAULT_WORKERS: usize = 5;

/// One end-to-end processing request.
#[derive(Clone, Debug)]
pub struct JobRequest {
    /// The full text to process.
    pub text: String,
    /// Natural-language instruction prefixed to every chunk.
    pub instruction: String,
    /// Credential for the completion endpoint.
    pub credential: String,
    /// Completion endpoint base URL; empty means
    /// [`DEFAULT_ENDPOINT`](crate::client::DEFAULT_ENDPOINT).
    pub endpoint: String,
    /// Completion model identifier; empty means [`DEFAULT_MODEL`].
    pub model: String,
    /// Requested per-batch concurrency; clamped to the configured bound.
    pub max_workers: usize,
    /// Caller-chosen session identifier. Generated from submission time
    /// when absent.
    pub session_id: Option<String>,
}

impl JobRequest {
    /// Builds a request with default endpoint, model, and concurrency.
    pub fn new(
        text: impl Into<String>,
        instruction: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            instruction: instruction.into(),
            credential: credential.into(),
            endpoint: String::new(),
            model: String::new(),
            max_workers: DEFAULT_WORKERS,
            session_id: None,
        }
    }

    /// Overrides the completion endpoint base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the completion model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the requested per-batch concurrency.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Chooses the session identifier instead of generating one.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// The job engine's boundary surface.
///
/// Holds the session-keyed [`JobStore`] shared between background job
/// tasks (writers) and status pollers (readers), plus the connector that
/// produces a completion backend per submission.
pub struct TextService<C> {
    config: EngineConfig,
    connector: C,
    store: Arc<JobStore>,
}

impl<C: CompletionConnector> TextService<C> {
    /// Creates a service with the given configuration and backend
    /// connector.
    pub fn new(config: EngineConfig, connector: C) -> Self {
        let store = Arc::new(JobStore::new(config.max_retained_jobs));
        Self {
            config,
            connector,
            store,
        }
    }

    /// Validates and starts a job, returning its session identifier once
    /// the background task is spawned.
    ///
    /// Validation and credential verification happen synchronously within
    /// this call; anything that fails here leaves no job record behind.
    /// Everything after — splitting, dispatch, reassembly — runs in the
    /// background and is observable via [`get_status`](Self::get_status).
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when text, instruction, or credential is
    ///   empty.
    /// - [`Error::Auth`] when the endpoint rejects the credential.
    /// - [`Error::DuplicateSession`] when the chosen identifier belongs to
    ///   a live job.
    pub async fn submit_job(&self, request: JobRequest) -> Result<String> {
        if request.text.trim().is_empty() {
            return Err(Error::validation("text is required"));
        }
        if request.instruction.trim().is_empty() {
            return Err(Error::validation("instruction is required"));
        }
        if request.credential.is_empty() {
            return Err(Error::validation("credential is required"));
        }

        let backend = self
            .connector
            .connect(&request.credential, &request.endpoint, &request.model)?;
        backend.verify().await?;

        let session_id = request
            .session_id
            .unwrap_or_else(generate_session_id);
        self.store.create(&session_id)?;

        let workers = request.max_workers.clamp(1, self.config.max_workers.max(1));
        tracing::info!(session_id = %session_id, workers, "job accepted");

        dispatch::spawn_job(
            Arc::clone(&self.store),
            Arc::new(backend),
            self.config.clone(),
            JobParams {
                session_id: session_id.clone(),
                text: request.text,
                instruction: request.instruction,
                workers,
            },
        );

        Ok(session_id)
    }

    /// Returns a point-in-time snapshot of the job's state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for an unknown identifier.
    pub fn get_status(&self, session_id: &str) -> Result<JobSnapshot> {
        self.store
            .snapshot(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_owned(),
            })
    }

    /// Standalone pre-flight credential check against an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the endpoint rejects the credential or
    /// cannot be reached.
    pub async fn verify_credential(&self, credential: &str, endpoint: &str) -> Result<()> {
        let backend = self.connector.connect(credential, endpoint, DEFAULT_MODEL)?;
        backend.verify().await
    }

    /// Liveness probe.
    pub fn health(&self) -> HealthReport {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        HealthReport {
            status: "healthy".to_owned(),
            timestamp,
        }
    }
}

/// Session identifier derived from submission time (Unix milliseconds).
fn generate_session_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}
