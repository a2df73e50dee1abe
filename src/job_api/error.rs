//! Error types for the transcription job API.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the job API.
///
/// [`is_transient`](JobApiError::is_transient) separates failures worth
/// retrying (rate limits, 5xx, network) from contract-level rejections.
#[derive(Debug, Error)]
pub enum JobApiError {
    /// The service refused the request as malformed (HTTP 400/422).
    #[error("invalid job request: {0}")]
    InvalidRequest(String),

    /// A job with this name is already registered (HTTP 409).
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("job not found: {0}")]
    NotFound(String),

    /// HTTP 429. `retry_after_ms` comes from the `Retry-After` header.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("service unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Any other non-success status, such as 401 for a bad token.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl JobApiError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JobApiError::RateLimited { .. }
                | JobApiError::Unavailable { .. }
                | JobApiError::Network(_)
                | JobApiError::Timeout(_)
        )
    }

    /// Minimum wait the service asked for before the next call.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            JobApiError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}
