//! Progress notifications for front-ends that want to follow a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::state_machine::{JobId, JobStatus, Stage, State};
use crate::store::Location;

/// Something that happened during an orchestration.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StateChanged(State),
    Uploaded(Location),
    Submitted(JobId),
    Polled {
        attempt: u32,
        status: JobStatus,
    },
    Retrying {
        stage: Stage,
        attempt: u32,
        max_retries: u32,
        delay: Duration,
        reason: String,
    },
    Finished {
        succeeded: bool,
        summary: String,
    },
}

/// Receives progress events. Called inline from the orchestration task, so
/// implementations should return quickly.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Optional observer handle passed down to each component. Also counts the
/// status queries that returned a snapshot.
#[derive(Clone, Default)]
pub struct Progress {
    observer: Option<Arc<dyn ProgressObserver>>,
    polls: Arc<AtomicU32>,
}

impl Progress {
    pub fn new(observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            observer: Some(observer),
            polls: Arc::default(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if matches!(event, ProgressEvent::Polled { .. }) {
            self.polls.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::Relaxed)
    }
}

/// Observer that records every event, for inspection after a run.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        events.push(event.clone());
    }
}
