use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TranscribeError;
use crate::fetcher::{ResultFetcher, TranscriptResult};
use crate::job_api::JobApi;
use crate::poller::{JobPoller, PollPolicy};
use crate::progress::{Progress, ProgressEvent, ProgressObserver};
use crate::retry::{Interrupt, guarded};
use crate::state_machine::{
    JobId, JobRequest, RetryConfig, Run, RunRecord, Stage, State, StateMachine, StepOutcome,
    TerminalStatus,
};
use crate::store::{Artifact, ArtifactClient, ArtifactStore, StoreError};
use crate::submitter::JobSubmitter;

/// Everything an orchestration needs besides its two clients.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub input_bucket: String,
    pub output_bucket: String,
    pub language_code: String,
    /// Backoff for submit and fetch retries.
    pub retry: RetryConfig,
    pub poll: PollPolicy,
    /// Budget for each upload, submit and fetch request.
    pub request_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            input_bucket: "awstranscribeinput".into(),
            output_bucket: "awstranscribeoutput".into(),
            language_code: "en-US".into(),
            retry: RetryConfig::default(),
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The single result of `transcribe`.
#[derive(Debug)]
pub enum OrchestrationOutcome {
    Success { transcript: TranscriptResult },
    Failure { stage: Stage, reason: TranscribeError },
}

impl OrchestrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OrchestrationOutcome::Success { .. })
    }

    pub fn transcript(&self) -> Option<&str> {
        match self {
            OrchestrationOutcome::Success { transcript } => Some(transcript.text()),
            OrchestrationOutcome::Failure { .. } => None,
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { stage, .. } => Some(*stage),
        }
    }

    pub fn reason(&self) -> Option<&TranscribeError> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { reason, .. } => Some(reason),
        }
    }

    /// One-line description: the transcript, or `<stage>: <reason>`.
    pub fn summary(&self) -> String {
        match self {
            OrchestrationOutcome::Success { transcript } => transcript.text().to_string(),
            OrchestrationOutcome::Failure { stage, reason } => format!("{stage}: {reason}"),
        }
    }
}

/// Outcome of a run together with its audit record.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: OrchestrationOutcome,
    pub record: RunRecord,
}

/// Publishes state changes to the observer and, for spawned runs, the watch.
struct StateTracker<'a> {
    progress: &'a Progress,
    state_tx: Option<&'a watch::Sender<State>>,
}

impl StateTracker<'_> {
    fn enter(&self, state: State) {
        if let Some(tx) = self.state_tx {
            tx.send_replace(state);
        }
        self.progress.emit(ProgressEvent::StateChanged(state));
    }
}

/// Runs upload → submit → poll → fetch for one audio artifact at a time.
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    artifacts: ArtifactClient,
    submitter: JobSubmitter,
    poller: JobPoller,
    fetcher: ResultFetcher,
    settings: OrchestratorSettings,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        api: Arc<dyn JobApi>,
        settings: OrchestratorSettings,
    ) -> Self {
        let timeout = settings.request_timeout;
        Self {
            artifacts: ArtifactClient::new(store.clone(), settings.input_bucket.clone()),
            submitter: JobSubmitter::new(api.clone(), settings.retry.clone(), timeout),
            poller: JobPoller::new(api, settings.poll.clone()),
            fetcher: ResultFetcher::new(store, settings.retry.clone(), timeout),
            settings,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Transcribes `audio`. The media format comes from `filename`.
    pub async fn transcribe(
        &self,
        audio: impl Into<Bytes>,
        filename: &str,
    ) -> OrchestrationOutcome {
        self.run(audio, filename, &CancellationToken::new())
            .await
            .outcome
    }

    /// Like [`transcribe`](Self::transcribe), stopping early when `cancel`
    /// fires, and also returning the run record.
    pub async fn run(
        &self,
        audio: impl Into<Bytes>,
        filename: &str,
        cancel: &CancellationToken,
    ) -> RunReport {
        self.execute(Artifact::new(audio, filename), cancel, None)
            .await
    }

    /// Runs the orchestration on its own tokio task.
    pub fn spawn(self: &Arc<Self>, audio: impl Into<Bytes>, filename: &str) -> TranscriptionTask {
        let artifact = Artifact::new(audio, filename);
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(State::Idle);
        let started_at = Utc::now();

        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.execute(artifact, &token, Some(&tx)).await });

        TranscriptionTask {
            handle,
            cancel,
            state: rx,
            filename: filename.to_string(),
            started_at,
        }
    }

    async fn execute(
        &self,
        artifact: Artifact,
        cancel: &CancellationToken,
        state_tx: Option<&watch::Sender<State>>,
    ) -> RunReport {
        let started_at = Utc::now();
        let progress = match &self.observer {
            Some(observer) => Progress::new(observer.clone()),
            None => Progress::none(),
        };
        let tracker = StateTracker {
            progress: &progress,
            state_tx,
        };

        info!(
            file = %artifact.filename,
            bytes = artifact.len(),
            format = %artifact.format,
            "starting transcription"
        );

        let mut run = Run::new();
        let mut job_id = None;
        let result = self
            .drive(&mut run, &mut job_id, &artifact, cancel, &tracker)
            .await;

        let outcome = match result {
            Ok(transcript) => {
                StateMachine::next(&mut run, StepOutcome::Success);
                OrchestrationOutcome::Success { transcript }
            }
            Err(reason) => {
                StateMachine::next(&mut run, StepOutcome::Failure);
                let stage = run.failed_stage.unwrap_or(Stage::Upload);
                warn!(
                    file = %artifact.filename,
                    stage = %stage,
                    error = %reason,
                    "transcription failed"
                );
                OrchestrationOutcome::Failure { stage, reason }
            }
        };
        tracker.enter(run.state);

        let completed_at = Utc::now();
        let record = RunRecord {
            job_id,
            filename: artifact.filename.clone(),
            state_transitions: run.transitions(),
            poll_count: progress.polls(),
            succeeded: outcome.is_success(),
            failed_stage: outcome.failed_stage(),
            summary: outcome.summary(),
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };
        info!(
            file = %record.filename,
            succeeded = record.succeeded,
            polls = record.poll_count,
            duration_ms = record.duration_ms,
            "transcription finished"
        );
        progress.emit(ProgressEvent::Finished {
            succeeded: record.succeeded,
            summary: record.summary.clone(),
        });

        RunReport { outcome, record }
    }

    /// Advances `run` through every stage. On error `run` is left in the
    /// state whose stage failed.
    async fn drive(
        &self,
        run: &mut Run,
        job_id: &mut Option<JobId>,
        artifact: &Artifact,
        cancel: &CancellationToken,
        tracker: &StateTracker<'_>,
    ) -> Result<TranscriptResult, TranscribeError> {
        let progress = tracker.progress;
        tracker.enter(run.state);

        self.advance(run, tracker);
        let timeout = self.settings.request_timeout;
        let input = match guarded(cancel, timeout, self.artifacts.upload(artifact)).await {
            Err(Interrupt::Cancelled) => return Err(TranscribeError::Cancelled),
            Err(Interrupt::TimedOut) => return Err(StoreError::Timeout(timeout.as_secs()).into()),
            Ok(uploaded) => uploaded?,
        };
        progress.emit(ProgressEvent::Uploaded(input.clone()));

        self.advance(run, tracker);
        let request = JobRequest {
            job_id: JobId::generate(),
            input,
            language_code: self.settings.language_code.clone(),
            media_format: artifact.format.clone(),
            output_bucket: self.settings.output_bucket.clone(),
        };
        *job_id = Some(request.job_id.clone());
        let id = self.submitter.submit(&request, cancel, progress).await?;
        progress.emit(ProgressEvent::Submitted(id.clone()));

        self.advance(run, tracker);
        let result_location = match self.poller.poll_until_terminal(&id, cancel, progress).await? {
            TerminalStatus::Completed { result_location } => result_location,
            TerminalStatus::Failed { reason } => {
                return Err(TranscribeError::RemoteJobFailure {
                    job_id: id.to_string(),
                    detail: reason,
                });
            }
        };

        self.advance(run, tracker);
        self.fetcher
            .fetch_and_parse(&id, &result_location, cancel, progress)
            .await
    }

    fn advance(&self, run: &mut Run, tracker: &StateTracker<'_>) {
        StateMachine::next(run, StepOutcome::Success);
        tracker.enter(run.state);
    }
}

/// Handle to a spawned orchestration.
pub struct TranscriptionTask {
    handle: JoinHandle<RunReport>,
    cancel: CancellationToken,
    state: watch::Receiver<State>,
    filename: String,
    started_at: chrono::DateTime<Utc>,
}

impl TranscriptionTask {
    /// Requests cancellation. The run finishes with a `cancelled` failure
    /// at whichever stage was active.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A watch of the orchestration state.
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.clone()
    }

    pub fn current_state(&self) -> State {
        *self.state.borrow()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish. A panicked task is reported as a failure
    /// of the stage that was running.
    pub async fn outcome(self) -> RunReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                let last = *self.state.borrow();
                let stage = last.stage().unwrap_or(Stage::Upload);
                warn!(
                    file = %self.filename,
                    stage = %stage,
                    error = %e,
                    "orchestration task did not complete"
                );

                let reason = TranscribeError::Aborted(e.to_string());
                let completed_at = Utc::now();
                let record = RunRecord {
                    job_id: None,
                    filename: self.filename,
                    state_transitions: vec![last, State::Done],
                    poll_count: 0,
                    succeeded: false,
                    failed_stage: Some(stage),
                    summary: format!("{stage}: {reason}"),
                    started_at: self.started_at,
                    completed_at,
                    duration_ms: (completed_at - self.started_at).num_milliseconds(),
                };
                RunReport {
                    outcome: OrchestrationOutcome::Failure { stage, reason },
                    record,
                }
            }
        }
    }
}
