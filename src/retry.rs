//! Bounded retries with exponential backoff, raced against cancellation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::job_api::JobApiError;
use crate::progress::{Progress, ProgressEvent};
use crate::state_machine::{RetryConfig, Stage};
use crate::store::StoreError;

/// Errors that know whether a repeat of the call could succeed.
pub trait Retryable: Display {
    fn is_transient(&self) -> bool;

    /// Minimum wait requested by the remote side.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// The error to report when a single call exceeds its time budget.
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for JobApiError {
    fn is_transient(&self) -> bool {
        JobApiError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        JobApiError::retry_after(self)
    }

    fn timed_out(after: Duration) -> Self {
        JobApiError::Timeout(after.as_secs())
    }
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        StoreError::Timeout(after.as_secs())
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut,
}

#[derive(Debug)]
pub enum RetryError<E> {
    Cancelled,
    /// The last error seen, after `attempts` calls.
    Failed { attempts: u32, error: E },
}

/// Runs `fut` unless `cancel` fires or `limit` elapses first.
pub async fn guarded<T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| Interrupt::TimedOut),
    }
}

/// Sleeps for `delay`. Returns `false` if cancelled first.
pub async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Calls `op` until it succeeds, fails permanently, or exhausts
/// `config.max_retries` retries of transient failures.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    request_timeout: Duration,
    cancel: &CancellationToken,
    progress: &Progress,
    stage: Stage,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let error = match guarded(cancel, request_timeout, op()).await {
            Err(Interrupt::Cancelled) => return Err(RetryError::Cancelled),
            Err(Interrupt::TimedOut) => E::timed_out(request_timeout),
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
        };

        if !error.is_transient() || attempt > config.max_retries {
            return Err(RetryError::Failed {
                attempts: attempt,
                error,
            });
        }

        let delay = config.wait_for_attempt(attempt, error.retry_after());
        warn!(
            stage = %stage,
            attempt,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transient failure, retrying"
        );
        progress.emit(ProgressEvent::Retrying {
            stage,
            attempt,
            max_retries: config.max_retries,
            delay,
            reason: error.to_string(),
        });

        if !sleep_or_cancel(cancel, delay).await {
            return Err(RetryError::Cancelled);
        }
    }
}
