use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::error::JobApiError;
use super::types::{ErrorBody, GetJobResponse, StartJobRequest};
use super::JobApi;
use crate::state_machine::{JobId, JobRequest, JobSnapshot};

pub struct HttpJobApi {
    token: Option<String>,
    client: Client,
    base_url: String,
}

impl HttpJobApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, JobApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            token,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn error_for_status(response: Response, job_name: &str) -> JobApiError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or(1000);
        return JobApiError::RateLimited { retry_after_ms };
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(text);

    match status {
        StatusCode::CONFLICT => JobApiError::AlreadyExists(job_name.to_string()),
        StatusCode::NOT_FOUND => JobApiError::NotFound(job_name.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            JobApiError::InvalidRequest(message)
        }
        s if s.is_server_error() => JobApiError::Unavailable {
            status: s.as_u16(),
            message,
        },
        s => JobApiError::ApiError {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn submit_job(&self, request: &JobRequest) -> Result<(), JobApiError> {
        let body = StartJobRequest::from(request);
        let response = self
            .authorize(self.client.post(format!("{}/jobs", self.base_url)))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, request.job_id.as_str()).await);
        }

        debug!(job_id = %request.job_id, "job accepted");
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<JobSnapshot, JobApiError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/jobs/{}", self.base_url, job_id.as_str())),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, job_id.as_str()).await);
        }

        let text = response.text().await?;
        let body: GetJobResponse =
            serde_json::from_str(&text).map_err(|e| JobApiError::Malformed(e.to_string()))?;
        Ok(body.transcription_job.into())
    }
}
