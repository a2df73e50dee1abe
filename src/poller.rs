use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TranscribeError;
use crate::job_api::{JobApi, JobApiError};
use crate::progress::{Progress, ProgressEvent};
use crate::retry::{Interrupt, guarded, sleep_or_cancel};
use crate::state_machine::{JobId, JobStatus, RetryConfig, Stage, TerminalStatus};

/// Timing rules for waiting on a job.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Wait after the first non-terminal status.
    pub interval: Duration,
    /// The wait doubles after each non-terminal status up to this cap.
    /// Equal to `interval` for a fixed cadence.
    pub max_interval: Duration,
    /// Hard wall-clock budget for the whole poll, queries included.
    pub max_wait: Duration,
    /// Consecutive transient query failures tolerated before giving up.
    pub query_retries: u32,
    /// Backoff between failed queries.
    pub retry: RetryConfig,
    /// Budget for a single status query.
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(900),
            query_retries: 3,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// The wait that follows `current` after another non-terminal status.
    pub fn next_interval(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_interval.max(self.interval))
    }
}

/// Queries a job until it reaches a terminal status or the deadline passes.
#[derive(Clone)]
pub struct JobPoller {
    api: Arc<dyn JobApi>,
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(api: Arc<dyn JobApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Polls `job_id` until COMPLETED or FAILED.
    ///
    /// Returns [`TranscribeError::Timeout`] once `max_wait` has elapsed and
    /// [`TranscribeError::Cancelled`] as soon as `cancel` fires, whether the
    /// poller is waiting or a query is in flight. Failed queries never extend
    /// the deadline.
    pub async fn poll_until_terminal(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Result<TerminalStatus, TranscribeError> {
        let started = Instant::now();
        let deadline = started + self.policy.max_wait;
        let timeout = || TranscribeError::Timeout {
            job_id: job_id.to_string(),
            waited: started.elapsed(),
        };

        let mut interval = self.policy.interval;
        let mut attempt = 0u32;
        let mut failures = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(job_id = %job_id, attempts = attempt, "gave up waiting for job");
                return Err(timeout());
            }
            attempt += 1;

            let limit = remaining.min(self.policy.request_timeout);
            let query = match guarded(cancel, limit, self.api.get_job(job_id)).await {
                Err(Interrupt::Cancelled) => {
                    info!(job_id = %job_id, "polling cancelled");
                    return Err(TranscribeError::Cancelled);
                }
                Err(Interrupt::TimedOut) => Err(JobApiError::Timeout(limit.as_secs())),
                Ok(result) => result,
            };

            let wait = match query {
                Ok(snapshot) => {
                    failures = 0;
                    debug!(job_id = %job_id, attempt, status = %snapshot.status, "job status");
                    progress.emit(ProgressEvent::Polled {
                        attempt,
                        status: snapshot.status,
                    });

                    match snapshot.status {
                        JobStatus::Completed => {
                            let result_location = snapshot.result_location.ok_or_else(|| {
                                TranscribeError::Parse(format!(
                                    "job {job_id} completed without a transcript location"
                                ))
                            })?;
                            info!(
                                job_id = %job_id,
                                attempts = attempt,
                                result = %result_location,
                                "job completed"
                            );
                            return Ok(TerminalStatus::Completed { result_location });
                        }
                        JobStatus::Failed => {
                            warn!(
                                job_id = %job_id,
                                reason = snapshot.failure_reason.as_deref().unwrap_or("unknown"),
                                "job failed remotely"
                            );
                            return Ok(TerminalStatus::Failed {
                                reason: snapshot.failure_reason,
                            });
                        }
                        JobStatus::Queued | JobStatus::InProgress => {
                            let wait = interval;
                            interval = self.policy.next_interval(interval);
                            wait
                        }
                    }
                }
                Err(e) if e.is_transient() && failures < self.policy.query_retries => {
                    failures += 1;
                    let delay = self.policy.retry.wait_for_attempt(failures, e.retry_after());
                    warn!(
                        job_id = %job_id,
                        failures,
                        max = self.policy.query_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "status query failed, retrying"
                    );
                    progress.emit(ProgressEvent::Retrying {
                        stage: Stage::Poll,
                        attempt: failures,
                        max_retries: self.policy.query_retries,
                        delay,
                        reason: e.to_string(),
                    });
                    delay
                }
                Err(e) => {
                    if matches!(e, JobApiError::Timeout(_)) && Instant::now() >= deadline {
                        return Err(timeout());
                    }
                    return Err(TranscribeError::from_query_error(e, failures + 1));
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timeout());
            }
            if !sleep_or_cancel(cancel, wait.min(remaining)).await {
                info!(job_id = %job_id, "polling cancelled");
                return Err(TranscribeError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_api::SimulatedJobApi;
    use crate::state_machine::JobRequest;
    use crate::store::{Location, MediaFormat};

    fn policy(interval_ms: u64, max_wait_ms: u64) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(interval_ms),
            max_interval: Duration::from_millis(interval_ms),
            max_wait: Duration::from_millis(max_wait_ms),
            query_retries: 2,
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            request_timeout: Duration::from_secs(1),
        }
    }

    async fn api_with(script: Vec<JobStatus>) -> Arc<SimulatedJobApi> {
        let api = Arc::new(SimulatedJobApi::new().with_statuses(script));
        api.submit_job(&JobRequest {
            job_id: JobId::from_raw("job-abc"),
            input: Location::from_raw("mem://in/a.mp3"),
            language_code: "en-US".into(),
            media_format: MediaFormat::new("mp3"),
            output_bucket: "out".into(),
        })
        .await
        .unwrap();
        api
    }

    #[tokio::test]
    async fn returns_on_completion() {
        let api = api_with(vec![
            JobStatus::InProgress,
            JobStatus::InProgress,
            JobStatus::Completed,
        ])
        .await;
        let progress = Progress::none();

        let status = JobPoller::new(api.clone(), policy(5, 5_000))
            .poll_until_terminal(&JobId::from_raw("job-abc"), &CancellationToken::new(), &progress)
            .await
            .unwrap();

        assert_eq!(
            status,
            TerminalStatus::Completed {
                result_location: Location::from_raw("r://out/job-abc.json")
            }
        );
        assert_eq!(api.get_calls(), 3);
        assert_eq!(progress.polls(), 3);
    }

    #[tokio::test]
    async fn failed_job_is_terminal() {
        let api = api_with(vec![JobStatus::Queued, JobStatus::Failed]).await;
        let status = JobPoller::new(api.clone(), policy(5, 5_000))
            .poll_until_terminal(
                &JobId::from_raw("job-abc"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap();

        assert_eq!(
            status,
            TerminalStatus::Failed {
                reason: Some("simulated failure".into())
            }
        );
        assert_eq!(api.get_calls(), 2);
    }

    #[tokio::test]
    async fn stuck_job_times_out() {
        let api = api_with(vec![JobStatus::InProgress]).await;
        let started = std::time::Instant::now();

        let err = JobPoller::new(api.clone(), policy(10, 100))
            .poll_until_terminal(
                &JobId::from_raw("job-abc"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(api.get_calls() >= 2);
    }

    #[tokio::test]
    async fn cancel_stops_within_one_interval() {
        let api = api_with(vec![JobStatus::InProgress]).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = JobPoller::new(api.clone(), policy(10_000, 60_000))
            .poll_until_terminal(&JobId::from_raw("job-abc"), &cancel, &Progress::none())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
        let calls = api.get_calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(api.get_calls(), calls);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn transient_query_failures_are_absorbed() {
        let api = api_with(vec![JobStatus::Completed]).await;
        api.fail_next_queries(2);

        let status = JobPoller::new(api.clone(), policy(5, 5_000))
            .poll_until_terminal(
                &JobId::from_raw("job-abc"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap();

        assert!(matches!(status, TerminalStatus::Completed { .. }));
        assert_eq!(api.get_calls(), 3);
    }

    #[tokio::test]
    async fn persistent_query_failures_escalate() {
        let api = api_with(vec![JobStatus::Completed]).await;
        api.fail_next_queries(10);

        let err = JobPoller::new(api.clone(), policy(5, 5_000))
            .poll_until_terminal(
                &JobId::from_raw("job-abc"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Transient { attempts: 3, .. }));
        assert_eq!(api.get_calls(), 3);
    }

    #[tokio::test]
    async fn unknown_job_fails_immediately() {
        let api = Arc::new(SimulatedJobApi::new());
        let err = JobPoller::new(api.clone(), policy(5, 5_000))
            .poll_until_terminal(
                &JobId::from_raw("job-missing"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Rejected(_)));
        assert_eq!(api.get_calls(), 1);
    }

    #[tokio::test]
    async fn slow_queries_count_against_deadline() {
        let api = Arc::new(
            SimulatedJobApi::new()
                .with_statuses(vec![JobStatus::InProgress])
                .with_query_latency(Duration::from_millis(400)),
        );
        api.submit_job(&JobRequest {
            job_id: JobId::from_raw("job-slow"),
            input: Location::from_raw("mem://in/a.mp3"),
            language_code: "en-US".into(),
            media_format: MediaFormat::new("mp3"),
            output_bucket: "out".into(),
        })
        .await
        .unwrap();

        let started = std::time::Instant::now();
        let err = JobPoller::new(api.clone(), policy(5, 150))
            .poll_until_terminal(
                &JobId::from_raw("job-slow"),
                &CancellationToken::new(),
                &Progress::none(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_millis(350));
    }

    #[test]
    fn interval_growth_is_capped() {
        let p = PollPolicy {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
            ..PollPolicy::default()
        };
        let mut interval = p.interval;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(interval.as_secs());
            interval = p.next_interval(interval);
        }
        assert_eq!(seen, vec![1, 2, 4, 4]);
    }

    #[test]
    fn equal_bounds_give_fixed_interval() {
        let p = PollPolicy::default();
        assert_eq!(p.next_interval(p.interval), Duration::from_secs(5));
    }
}
