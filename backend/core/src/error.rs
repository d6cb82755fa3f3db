use thiserror::Error;

/// Top-level error type for the Porchline service.
///
/// Externally observable failures collapse to a small set of HTTP
/// statuses at the gateway; the detail here is for server-side logs only.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("chat session not found: {0}")]
    SessionNotFound(String),

    #[error("completion provider error: {0}")]
    Completion(String),

    #[error("notification dispatch failed: {0}")]
    Notification(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
