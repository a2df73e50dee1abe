use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use jobscribe::{
    InMemoryArtifactStore, JobStatus, OrchestrationOutcome, Orchestrator, OrchestratorSettings,
    PollPolicy, RecordingObserver, RetryConfig, SimulatedJobApi, Stage, State, TranscribeError,
};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
    }
}

fn settings(interval_ms: u64, max_wait_ms: u64) -> OrchestratorSettings {
    OrchestratorSettings {
        input_bucket: "in".into(),
        output_bucket: "out".into(),
        language_code: "en-US".into(),
        retry: fast_retry(),
        poll: PollPolicy {
            interval: Duration::from_millis(interval_ms),
            max_interval: Duration::from_millis(interval_ms),
            max_wait: Duration::from_millis(max_wait_ms),
            query_retries: 3,
            retry: fast_retry(),
            request_timeout: Duration::from_secs(1),
        },
        request_timeout: Duration::from_secs(1),
    }
}

fn services(script: Vec<JobStatus>) -> (Arc<InMemoryArtifactStore>, Arc<SimulatedJobApi>) {
    let store = Arc::new(InMemoryArtifactStore::new("r"));
    let api = Arc::new(
        SimulatedJobApi::new()
            .with_statuses(script)
            .with_transcript("hello world")
            .with_output_store(store.clone(), "r"),
    );
    (store, api)
}

#[tokio::test]
async fn hello_mp3_end_to_end() {
    let (store, api) = services(vec![
        JobStatus::InProgress,
        JobStatus::InProgress,
        JobStatus::Completed,
    ]);
    let orch = Orchestrator::new(store.clone(), api.clone(), settings(10, 5_000));

    let outcome = orch.transcribe(&b"ID3 audio"[..], "hello.mp3").await;

    match outcome {
        OrchestrationOutcome::Success { transcript } => {
            assert_eq!(transcript.text(), "hello world")
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(api.get_calls(), 3);
    assert_eq!(api.submit_calls(), 1);
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.get_count(), 1);
}

#[tokio::test]
async fn remote_failure_is_reported_at_poll_without_fetch() {
    let store = Arc::new(InMemoryArtifactStore::new("r"));
    let api = Arc::new(
        SimulatedJobApi::new()
            .with_statuses(vec![JobStatus::Queued, JobStatus::Failed])
            .with_failure_reason("unreadable media")
            .with_output_store(store.clone(), "r"),
    );
    let orch = Orchestrator::new(store.clone(), api, settings(10, 5_000));

    let outcome = orch.transcribe(&b"audio"[..], "hello.mp3").await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Poll));
    let reason = outcome.reason().unwrap();
    assert_eq!(reason.to_string(), "remote job failed");
    assert!(matches!(
        reason,
        TranscribeError::RemoteJobFailure { detail: Some(d), .. } if d == "unreadable media"
    ));
    assert_eq!(store.get_count(), 0);
}

#[tokio::test]
async fn lost_submit_ack_yields_one_job() {
    let (store, api) = services(vec![JobStatus::Completed]);
    api.drop_next_acks(1);
    let orch = Orchestrator::new(store, api.clone(), settings(10, 5_000));

    let report = orch
        .run(&b"audio"[..], "hello.mp3", &CancellationToken::new())
        .await;

    assert_eq!(report.outcome.transcript(), Some("hello world"));
    assert_eq!(api.submit_calls(), 2);
    assert_eq!(api.job_count(), 1);
    assert!(report.record.state_transitions.contains(&State::Polling));
}

#[tokio::test]
async fn cancel_mid_poll_stops_queries() {
    let (store, api) = services(vec![JobStatus::InProgress]);
    let orch = Arc::new(Orchestrator::new(store, api.clone(), settings(10_000, 60_000)));

    let task = orch.spawn(&b"audio"[..], "hello.mp3");
    let mut state = task.state();
    state.wait_for(|s| *s == State::Polling).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(task.current_state(), State::Polling);

    let started = Instant::now();
    task.cancel();
    let report = task.outcome().await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.outcome.failed_stage(), Some(Stage::Poll));
    assert_eq!(report.outcome.reason().unwrap().to_string(), "cancelled");
    assert_eq!(report.record.summary, "poll: cancelled");

    let calls = api.get_calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(api.get_calls(), calls);
}

#[tokio::test]
async fn denied_upload_fails_at_upload() {
    let (store, api) = services(vec![JobStatus::Completed]);
    store.deny_puts();
    let orch = Orchestrator::new(store, api.clone(), settings(10, 5_000));

    let report = orch
        .run(&b"audio"[..], "hello.mp3", &CancellationToken::new())
        .await;

    assert_eq!(report.outcome.failed_stage(), Some(Stage::Upload));
    assert!(report.record.job_id.is_none());
    assert_eq!(
        report.record.state_transitions,
        vec![State::Idle, State::Uploading, State::Done]
    );
    assert_eq!(api.submit_calls(), 0);
}

#[tokio::test]
async fn stuck_job_finishes_within_max_wait() {
    let (store, api) = services(vec![JobStatus::InProgress]);
    let orch = Orchestrator::new(store, api, settings(20, 200));

    let started = Instant::now();
    let outcome = orch.transcribe(&b"audio"[..], "hello.mp3").await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.failed_stage(), Some(Stage::Poll));
    assert!(matches!(outcome.reason(), Some(TranscribeError::Timeout { .. })));
}

#[tokio::test]
async fn transient_fetch_failures_are_retried() {
    let (store, api) = services(vec![JobStatus::Completed]);
    store.fail_next_gets(2);
    let orch = Orchestrator::new(store.clone(), api, settings(10, 5_000));

    let outcome = orch.transcribe(&b"audio"[..], "hello.mp3").await;

    assert_eq!(outcome.transcript(), Some("hello world"));
    assert_eq!(store.get_count(), 3);
}

#[tokio::test]
async fn concurrent_runs_share_clients() {
    let (store, api) = services(vec![JobStatus::InProgress, JobStatus::Completed]);
    let recorder = Arc::new(RecordingObserver::default());
    let orch = Arc::new(
        Orchestrator::new(store.clone(), api.clone(), settings(10, 5_000))
            .with_observer(recorder.clone()),
    );

    let tasks: Vec<_> = (0..4)
        .map(|i| orch.spawn(format!("audio {i}").into_bytes(), &format!("clip-{i}.wav")))
        .collect();

    let mut job_ids = Vec::new();
    for task in tasks {
        let report = task.outcome().await;
        assert_eq!(report.outcome.transcript(), Some("hello world"));
        assert_eq!(report.record.poll_count, 2);
        job_ids.push(report.record.job_id.unwrap());
    }

    job_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    job_ids.dedup();
    assert_eq!(job_ids.len(), 4);
    assert_eq!(api.job_count(), 4);
    assert_eq!(store.put_count(), 4);
}
