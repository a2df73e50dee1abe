pub mod client;
pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::state_machine::{JobId, JobRequest, JobSnapshot};

pub use client::HttpJobApi;
pub use error::JobApiError;
pub use memory::SimulatedJobApi;

/// The remote job service, consumed as a black box with eventual terminal states.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Registers a job under `request.job_id`. The service deduplicates by name
    /// and answers [`JobApiError::AlreadyExists`] on a repeat.
    async fn submit_job(&self, request: &JobRequest) -> Result<(), JobApiError>;

    async fn get_job(&self, job_id: &JobId) -> Result<JobSnapshot, JobApiError>;
}
