//! Upload, submit, poll and fetch for remote transcription jobs.

pub mod error;
pub mod fetcher;
pub mod job_api;
pub mod orchestrator;
pub mod poller;
pub mod progress;
pub mod retry;
pub mod state_machine;
pub mod store;
pub mod submitter;

pub use error::TranscribeError;
pub use fetcher::{ResultFetcher, TranscriptResult};
pub use job_api::{HttpJobApi, JobApi, JobApiError, SimulatedJobApi};
pub use orchestrator::{
    OrchestrationOutcome, Orchestrator, OrchestratorSettings, RunReport, TranscriptionTask,
};
pub use poller::{JobPoller, PollPolicy};
pub use progress::{Progress, ProgressEvent, ProgressObserver, RecordingObserver};
pub use state_machine::{JobId, JobStatus, RetryConfig, RunRecord, Stage, State};
pub use store::{ArtifactStore, HttpArtifactStore, InMemoryArtifactStore, Location};
pub use submitter::JobSubmitter;
