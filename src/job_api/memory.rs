use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::error::JobApiError;
use super::JobApi;
use crate::state_machine::{JobId, JobRequest, JobSnapshot, JobStatus};
use crate::store::{InMemoryArtifactStore, Location};

struct SimulatedJob {
    request: JobRequest,
    polls: usize,
    result: Option<Location>,
}

#[derive(Default)]
struct Counters {
    failing_submits: u32,
    dropped_acks: u32,
    failing_queries: u32,
    submit_calls: u32,
    get_calls: u32,
}

/// In-process stand-in for the remote job service.
///
/// Jobs are deduplicated by name. Each status query of a job returns the next
/// entry of the status script (the last entry repeats). On completion a
/// transcript payload is written to the attached store, if any.
pub struct SimulatedJobApi {
    jobs: Mutex<HashMap<String, SimulatedJob>>,
    counters: Mutex<Counters>,
    script: Vec<JobStatus>,
    transcript: String,
    failure_reason: String,
    result_scheme: String,
    output: Option<Arc<InMemoryArtifactStore>>,
    query_latency: Duration,
}

impl Default for SimulatedJobApi {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedJobApi {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
            script: vec![JobStatus::InProgress, JobStatus::Completed],
            transcript: String::new(),
            failure_reason: "simulated failure".into(),
            result_scheme: "r".into(),
            output: None,
            query_latency: Duration::ZERO,
        }
    }

    /// Status sequence returned by successive queries of a job.
    pub fn with_statuses(mut self, script: Vec<JobStatus>) -> Self {
        if !script.is_empty() {
            self.script = script;
        }
        self
    }

    pub fn with_transcript(mut self, text: &str) -> Self {
        self.transcript = text.to_string();
        self
    }

    pub fn with_failure_reason(mut self, reason: &str) -> Self {
        self.failure_reason = reason.to_string();
        self
    }

    /// Writes result payloads into `store`; result locations use its scheme.
    pub fn with_output_store(mut self, store: Arc<InMemoryArtifactStore>, scheme: &str) -> Self {
        self.output = Some(store);
        self.result_scheme = scheme.to_string();
        self
    }

    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.query_latency = latency;
        self
    }

    /// The next `count` submits fail before reaching the service.
    pub fn fail_next_submits(&self, count: u32) {
        self.counters().failing_submits = count;
    }

    /// The next `count` submits are accepted but the acknowledgement is lost.
    pub fn drop_next_acks(&self, count: u32) {
        self.counters().dropped_acks = count;
    }

    /// The next `count` status queries fail with a transient error.
    pub fn fail_next_queries(&self, count: u32) {
        self.counters().failing_queries = count;
    }

    pub fn submit_calls(&self) -> u32 {
        self.counters().submit_calls
    }

    pub fn get_calls(&self) -> u32 {
        self.counters().get_calls
    }

    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }

    /// The request registered under `job_id`, if any.
    pub fn job_request(&self, job_id: &JobId) -> Option<JobRequest> {
        self.jobs().get(job_id.as_str()).map(|j| j.request.clone())
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, SimulatedJob>> {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn take(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    /// Writes the result payload without touching the store's put counter.
    fn publish_result(&self, job_id: &JobId, bucket: &str) -> Location {
        let location = Location::object(&self.result_scheme, bucket, &format!("{job_id}.json"));
        if let Some(store) = &self.output {
            let payload = json!({
                "jobName": job_id.as_str(),
                "results": {"transcripts": [{"transcript": self.transcript}]},
                "status": "COMPLETED"
            });
            store.insert(&location, payload.to_string());
        }
        location
    }
}

#[async_trait]
impl JobApi for SimulatedJobApi {
    async fn submit_job(&self, request: &JobRequest) -> Result<(), JobApiError> {
        let drop_ack = {
            let mut counters = self.counters();
            counters.submit_calls += 1;
            if Self::take(&mut counters.failing_submits) {
                return Err(JobApiError::Unavailable {
                    status: 503,
                    message: "injected failure".into(),
                });
            }
            Self::take(&mut counters.dropped_acks)
        };

        if !request.media_format.is_supported() {
            return Err(JobApiError::InvalidRequest(format!(
                "unsupported media format: {}",
                request.media_format
            )));
        }
        if request.language_code.trim().is_empty() {
            return Err(JobApiError::InvalidRequest("missing language code".into()));
        }

        {
            let mut jobs = self.jobs();
            if jobs.contains_key(request.job_id.as_str()) {
                return Err(JobApiError::AlreadyExists(request.job_id.to_string()));
            }
            jobs.insert(
                request.job_id.to_string(),
                SimulatedJob {
                    request: request.clone(),
                    polls: 0,
                    result: None,
                },
            );
        }
        debug!(job_id = %request.job_id, "simulated job registered");

        if drop_ack {
            return Err(JobApiError::Unavailable {
                status: 504,
                message: "acknowledgement lost".into(),
            });
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<JobSnapshot, JobApiError> {
        if !self.query_latency.is_zero() {
            tokio::time::sleep(self.query_latency).await;
        }

        {
            let mut counters = self.counters();
            counters.get_calls += 1;
            if Self::take(&mut counters.failing_queries) {
                return Err(JobApiError::Unavailable {
                    status: 503,
                    message: "injected failure".into(),
                });
            }
        }

        let (status, bucket, cached) = {
            let mut jobs = self.jobs();
            let job = jobs
                .get_mut(job_id.as_str())
                .ok_or_else(|| JobApiError::NotFound(job_id.to_string()))?;
            let idx = job.polls.min(self.script.len() - 1);
            job.polls += 1;
            (
                self.script[idx],
                job.request.output_bucket.clone(),
                job.result.clone(),
            )
        };

        let mut snapshot = JobSnapshot {
            job_id: job_id.clone(),
            status,
            result_location: None,
            failure_reason: None,
        };
        match status {
            JobStatus::Completed => {
                let location = match cached {
                    Some(location) => location,
                    None => {
                        let location = self.publish_result(job_id, &bucket);
                        if let Some(job) = self.jobs().get_mut(job_id.as_str()) {
                            job.result = Some(location.clone());
                        }
                        location
                    }
                };
                snapshot.result_location = Some(location);
            }
            JobStatus::Failed => snapshot.failure_reason = Some(self.failure_reason.clone()),
            JobStatus::Queued | JobStatus::InProgress => {}
        }
        Ok(snapshot)
    }
}
