use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::TranscribeError;
use crate::progress::Progress;
use crate::retry::{RetryError, with_retry};
use crate::state_machine::{JobId, RetryConfig, Stage};
use crate::store::{ArtifactStore, Location};

/// Transcript text of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    job_id: JobId,
    text: String,
}

impl TranscriptResult {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    results: PayloadResults,
}

#[derive(Debug, Deserialize)]
struct PayloadResults {
    transcripts: Vec<ChannelTranscript>,
}

#[derive(Debug, Deserialize)]
struct ChannelTranscript {
    transcript: String,
}

/// Extracts `results.transcripts[0].transcript` from a result payload.
pub fn parse_transcript(payload: &[u8]) -> Result<String, TranscribeError> {
    let doc: TranscriptPayload =
        serde_json::from_slice(payload).map_err(|e| TranscribeError::Parse(e.to_string()))?;
    doc.results
        .transcripts
        .into_iter()
        .next()
        .map(|c| c.transcript)
        .ok_or_else(|| TranscribeError::Parse("payload lists no transcripts".into()))
}

/// Downloads and parses result payloads.
#[derive(Clone)]
pub struct ResultFetcher {
    store: Arc<dyn ArtifactStore>,
    retry: RetryConfig,
    request_timeout: Duration,
}

impl ResultFetcher {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        retry: RetryConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            retry,
            request_timeout,
        }
    }

    /// Only called with the result location of a COMPLETED job.
    pub async fn fetch_and_parse(
        &self,
        job_id: &JobId,
        location: &Location,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<TranscriptResult, TranscribeError> {
        let store = &self.store;
        let payload = with_retry(
            &self.retry,
            self.request_timeout,
            cancel,
            progress,
            Stage::Fetch,
            move || store.get(location),
        )
        .await
        .map_err(|e| match e {
            RetryError::Cancelled => TranscribeError::Cancelled,
            RetryError::Failed { error, attempts } => {
                TranscribeError::Fetch(format!("{error} (after {attempts} attempts)"))
            }
        })?;

        let text = parse_transcript(&payload)?;
        info!(job_id = %job_id, chars = text.len(), "transcript retrieved");
        Ok(TranscriptResult {
            job_id: job_id.clone(),
            text,
        })
    }
}
