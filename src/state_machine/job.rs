use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{Stage, State};
use crate::store::{Location, MediaFormat};

/// Name under which a transcription job is registered with the remote service.
///
/// Generated locally so a resubmission after a dropped acknowledgement reuses
/// the same name and the service can deduplicate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(format!("transcription-job-{}", Uuid::new_v4()))
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the job API needs to start one transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub job_id: JobId,
    pub input: Location,
    pub language_code: String,
    pub media_format: MediaFormat,
    pub output_bucket: String,
}

/// Remote-side lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One status read from the job API. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result_location: Option<Location>,
    pub failure_reason: Option<String>,
}

/// How a job ended, as observed by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed { result_location: Location },
    Failed { reason: Option<String> },
}

/// Configuration for retry behavior on transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt using exponential backoff.
    /// delay = min(base_delay_ms * 2^(attempt - 1), max_delay_ms)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Backoff for `attempt`, raised to a server-requested wait but never
    /// beyond `max_delay_ms`.
    pub fn wait_for_attempt(&self, attempt: u32, requested: Option<Duration>) -> Duration {
        self.delay_for_attempt(attempt)
            .max(requested.unwrap_or_default())
            .min(Duration::from_millis(self.max_delay_ms))
    }
}

/// Structured record produced when an orchestration finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: Option<JobId>,
    pub filename: String,
    pub state_transitions: Vec<State>,
    pub poll_count: u32,
    pub succeeded: bool,
    pub failed_stage: Option<Stage>,
    pub summary: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}
