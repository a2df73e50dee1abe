//! Wire types for the transcription job API.
//!
//! Field names follow the remote service's PascalCase job record, e.g.
//! `TranscriptionJobName` and `Transcript.TranscriptFileUri`.

use serde::{Deserialize, Serialize};

use crate::state_machine::{JobId, JobRequest, JobSnapshot, JobStatus};
use crate::store::Location;

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartJobRequest {
    pub transcription_job_name: String,
    pub media: Media,
    pub media_format: String,
    pub language_code: String,
    pub output_bucket_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Media {
    pub media_file_uri: String,
}

impl From<&JobRequest> for StartJobRequest {
    fn from(req: &JobRequest) -> Self {
        Self {
            transcription_job_name: req.job_id.to_string(),
            media: Media {
                media_file_uri: req.input.to_string(),
            },
            media_format: req.media_format.to_string(),
            language_code: req.language_code.clone(),
            output_bucket_name: req.output_bucket.clone(),
        }
    }
}

/// Body returned by `GET /jobs/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetJobResponse {
    pub transcription_job: TranscriptionJob,
}

/// The job record as the service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptionJob {
    pub transcription_job_name: String,
    pub transcription_job_status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transcript {
    #[serde(default)]
    pub transcript_file_uri: Option<String>,
}

impl From<TranscriptionJob> for JobSnapshot {
    fn from(job: TranscriptionJob) -> Self {
        Self {
            job_id: JobId::from_raw(job.transcription_job_name),
            status: job.transcription_job_status,
            result_location: job
                .transcript
                .and_then(|t| t.transcript_file_uri)
                .map(Location::from_raw),
            failure_reason: job.failure_reason,
        }
    }
}

/// Error body the service attaches to 4xx answers.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}
