//! Error types for the artifact store.

use thiserror::Error;

/// Failures reported by an [`ArtifactStore`](super::ArtifactStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected our credentials (HTTP 401/403).
    #[error("permission denied for {location}: {message}")]
    PermissionDenied { location: String, message: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// The store answered with 429 or a 5xx status.
    #[error("store unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("store error (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Failure below HTTP (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable { .. } | StoreError::Network(_) | StoreError::Timeout(_)
        )
    }
}
