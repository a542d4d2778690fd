//! Completion client adapter.
//!
//! The dispatch engine never talks to the remote endpoint directly; it goes
//! through the [`CompletionBackend`] capability, which is injected at job
//! submission via a [`CompletionConnector`]. This keeps the engine testable
//! against deterministic in-process backends while the production path uses
//! [`HttpCompletionClient`] against any OpenAI-compatible chat-completions
//! API.
//!
//! No retry happens at this layer. A failed call surfaces as
//! [`Error::Remote`] (or [`Error::Auth`] for verification) and retry policy
//! belongs to the caller — the engine's current policy is fail-fast.

use serde::Deserialize;
use textfan_core::{Error, Result};

/// Default OpenAI-compatible API root used when a request names no endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Token budget requested per chunk completion.
const MAX_COMPLETION_TOKENS: u32 = 4_000;

/// Composes the outgoing message for one chunk.
///
/// The `": "` separator between instruction and chunk is part of the prompt
/// contract and must not change.
pub fn compose_message(instruction: &str, chunk_text: &str) -> String {
    format!("{instruction}: {chunk_text}")
}

/// Capability for submitting one chunk to the remote completion endpoint.
///
/// Implementations perform exactly one outbound call per
/// [`complete`](CompletionBackend::complete) invocation.
pub trait CompletionBackend: Send + Sync + 'static {
    /// Submits `chunk_text` under `instruction` and resolves to the
    /// completion text.
    ///
    /// # Errors
    ///
    /// Resolves to [`Error::Remote`] on transport failure, rejection, or
    /// rate limiting.
    fn complete(
        &self,
        instruction: &str,
        chunk_text: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Verifies the backend's credential against its endpoint.
    ///
    /// Called once at job submission so a bad credential fails fast,
    /// before any chunking or dispatch work begins.
    ///
    /// # Errors
    ///
    /// Resolves to [`Error::Auth`] when the endpoint rejects the
    /// credential or cannot be reached.
    fn verify(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Factory for [`CompletionBackend`]s, injected into the service facade.
///
/// Construction is synchronous and purely local; network contact happens
/// in [`CompletionBackend::verify`].
pub trait CompletionConnector: Send + Sync + 'static {
    type Backend: CompletionBackend;

    /// Builds a backend for the given credential, endpoint, and model.
    ///
    /// An empty `endpoint` falls back to [`DEFAULT_ENDPOINT`]; an empty
    /// `model` falls back to [`DEFAULT_MODEL`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when a client cannot be constructed for the
    /// given parameters.
    fn connect(&self, credential: &str, endpoint: &str, model: &str) -> Result<Self::Backend>;
}

/// Connector producing [`HttpCompletionClient`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpConnector;

impl CompletionConnector for HttpConnector {
    type Backend = HttpCompletionClient;

    fn connect(&self, credential: &str, endpoint: &str, model: &str) -> Result<Self::Backend> {
        HttpCompletionClient::new(credential, endpoint, model)
    }
}

/// HTTP client for OpenAI-compatible chat-completions endpoints.
///
/// `complete` posts to `{endpoint}/chat/completions` with a single message
/// and deterministic sampling parameters; `verify` lists
/// `{endpoint}/models` as a cheap credential probe.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    credential: String,
    endpoint: String,
    model: String,
}

impl HttpCompletionClient {
    /// Builds a client for the given credential, endpoint, and model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(credential: &str, endpoint: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| Error::Auth {
            message: format!("failed to construct HTTP client: {e}"),
        })?;
        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint
        };
        let model = if model.is_empty() { DEFAULT_MODEL } else { model };
        Ok(Self {
            http,
            credential: credential.to_owned(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, instruction: &str, chunk_text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "assistant",
                "content": compose_message(instruction, chunk_text),
            }],
            "temperature": 0,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "top_p": 1,
            "frequency_penalty": 0,
            "presence_penalty": 0,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::remote(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::remote(format!(
                "completion endpoint returned {status}: {detail}"
            )));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::remote(format!("malformed completion response: {e}")))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::remote("completion response contained no choices"))
    }

    async fn verify(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| Error::Auth {
                message: format!("endpoint unreachable: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Auth {
                message: format!("credential rejected by endpoint: {status}"),
            })
        }
    }
}
