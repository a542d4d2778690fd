//! Error types for the text-processing job engine.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable error case within the system. Synchronous
//! cases (`Validation`, `Auth`, `DuplicateSession`) are returned directly
//! to the submitter before any job record exists; `Remote` is recorded in
//! the owning job's state and only observable via polling.
//!
//! ## Error Cases
//! - `Validation`: A required input was empty or missing; rejected before
//!   any job is created.
//! - `Auth`: Credential/endpoint verification failed at submission time.
//! - `Remote`: A chunk's completion call failed during processing; aborts
//!   that job only.
//! - `SessionNotFound`: A status query named an unknown session identifier.
//! - `DuplicateSession`: A submission reused the identifier of a live job.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the text-processing job engine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A required input (text, instruction, credential) was empty or missing.
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    /// Credential or endpoint verification failed.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The remote completion endpoint rejected or failed a chunk request.
    #[error("Remote completion failed: {message}")]
    Remote { message: String },

    /// No job record exists for the given session identifier.
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A job with this session identifier is already in flight.
    #[error("Session already exists: {session_id}")]
    DuplicateSession { session_id: String },
}

impl Error {
    /// Convenience constructor for `Validation` errors.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for `Remote` errors.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}
