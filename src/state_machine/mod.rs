mod job;
mod state;

pub use job::{JobId, JobRequest, JobSnapshot, JobStatus, RetryConfig, RunRecord, TerminalStatus};
pub use state::{Run, Stage, State, StateMachine, StepOutcome, Transition};
