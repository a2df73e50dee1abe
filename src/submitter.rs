use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TranscribeError;
use crate::job_api::{JobApi, JobApiError};
use crate::progress::Progress;
use crate::retry::{RetryError, with_retry};
use crate::state_machine::{JobId, JobRequest, RetryConfig, Stage};

/// Starts transcription jobs, retrying transient failures under the same name.
#[derive(Clone)]
pub struct JobSubmitter {
    api: Arc<dyn JobApi>,
    retry: RetryConfig,
    request_timeout: Duration,
}

/// Accepts codes shaped like `en`, `en-US` or `cmn-Hans-CN`.
fn is_valid_language_code(code: &str) -> bool {
    let mut parts = code.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_lowercase()));
    primary_ok
        && parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn JobApi>, retry: RetryConfig, request_timeout: Duration) -> Self {
        Self {
            api,
            retry,
            request_timeout,
        }
    }

    /// Submits `request`. A resubmission answered with "already exists" means
    /// an earlier attempt reached the service, so it counts as submitted.
    pub async fn submit(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<JobId, TranscribeError> {
        if !request.media_format.is_supported() {
            return Err(TranscribeError::Submission(format!(
                "unsupported media format: {}",
                request.media_format
            )));
        }
        if !is_valid_language_code(&request.language_code) {
            return Err(TranscribeError::Submission(format!(
                "invalid language code: {:?}",
                request.language_code
            )));
        }

        let api = &self.api;
        let result = with_retry(
            &self.retry,
            self.request_timeout,
            cancel,
            progress,
            Stage::Submit,
            move || api.submit_job(request),
        )
        .await;

        match result {
            Ok(()) => {
                info!(job_id = %request.job_id, input = %request.input, "job submitted");
                Ok(request.job_id.clone())
            }
            Err(RetryError::Failed {
                error: JobApiError::AlreadyExists(_),
                attempts,
            }) => {
                if attempts == 1 {
                    warn!(job_id = %request.job_id, "job name already registered on first attempt");
                } else {
                    info!(
                        job_id = %request.job_id,
                        attempts,
                        "job already exists, assuming submitted"
                    );
                }
                Ok(request.job_id.clone())
            }
            Err(RetryError::Failed { error, attempts }) => {
                Err(TranscribeError::from_submit_error(error, attempts))
            }
            Err(RetryError::Cancelled) => Err(TranscribeError::Cancelled),
        }
    }
}
