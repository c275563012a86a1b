//! Error taxonomy for the contribution engine.
//!
//! Every fallible operation in this workspace returns [`Error`], so a
//! calling layer (HTTP, CLI) can map outcomes without string matching:
//! [`Error::NotFound`] to a 404-equivalent, [`Error::Validation`] to a
//! 400-equivalent, everything else to a 500-equivalent.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The target document does not exist or is not owned by the caller.
    /// Ownership failures are deliberately indistinguishable from missing
    /// rows so that probing for other authors' documents reveals nothing.
    #[error("document not found")]
    NotFound,

    /// The payload was rejected before any persistence step ran.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// An embedding or vector-store call failed upstream (network, rate
    /// limit, provider error). Not retried here; the whole ingestion can
    /// be re-run safely because stale chunks are always deleted before
    /// new ones are written.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// The backing store returned an error.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The process is misconfigured (missing credentials, unknown
    /// provider). Surfaces at startup rather than per-request.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Error::Upstream(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
