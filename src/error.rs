use std::time::Duration;

use thiserror::Error;

use crate::job_api::JobApiError;
use crate::store::StoreError;

/// Unified failure taxonomy surfaced to callers inside a failed outcome.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("transient failure persisted after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("timed out after {}s waiting for job {job_id}", waited.as_secs())]
    Timeout { job_id: String, waited: Duration },

    #[error("remote job failed")]
    RemoteJobFailure {
        job_id: String,
        detail: Option<String>,
    },

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("malformed transcript payload: {0}")]
    Parse(String),

    /// The job service refused a request for a reason other than bad input,
    /// such as an unknown job or a rejected credential.
    #[error("rejected by job service: {0}")]
    Rejected(String),

    #[error("cancelled")]
    Cancelled,

    /// The spawned orchestration task panicked or was aborted.
    #[error("orchestration task aborted: {0}")]
    Aborted(String),
}

impl TranscribeError {
    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TranscribeError::Transient { .. } | TranscribeError::Fetch(_) => true,
            TranscribeError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Maps a submit failure that is not retried any further.
    pub(crate) fn from_submit_error(err: JobApiError, attempts: u32) -> Self {
        match err {
            JobApiError::InvalidRequest(msg) => TranscribeError::Submission(msg),
            e if e.is_transient() => TranscribeError::Transient {
                attempts,
                message: e.to_string(),
            },
            e => TranscribeError::Rejected(e.to_string()),
        }
    }

    /// Maps a status query failure that is not retried any further.
    pub(crate) fn from_query_error(err: JobApiError, attempts: u32) -> Self {
        match err {
            JobApiError::Malformed(msg) => TranscribeError::Parse(msg),
            e if e.is_transient() => TranscribeError::Transient {
                attempts,
                message: e.to_string(),
            },
            e => TranscribeError::Rejected(e.to_string()),
        }
    }
}
