//! Retry policies shared by the HTTP client, the detail fetcher and the task
//! runner.
//!
//! Every call site describes its behaviour with a [`RetryPolicy`] value and a
//! retryability predicate instead of hand-written loops.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};

use crate::sync::{ProgressCallback, SyncProgress};

/// Delay between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant(Duration),
    /// Doubling delay, clamped to `[min, max]`.
    Exponential { min: Duration, max: Duration },
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    pub backoff: Backoff,
    pub with_jitter: bool,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self::constant(Duration::ZERO, 0)
    }

    #[must_use]
    pub fn constant(delay: Duration, max_retries: usize) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Constant(delay),
            with_jitter: false,
        }
    }

    #[must_use]
    pub fn exponential(min: Duration, max: Duration, max_retries: usize) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { min, max },
            with_jitter: true,
        }
    }

    /// Per-profile detail fetches: 1 second apart, 10 retries.
    #[must_use]
    pub fn detail_fetch() -> Self {
        Self::constant(Duration::from_secs(1), 10)
    }

    /// Intra API calls: 1s..30s exponential with jitter, 3 retries.
    #[must_use]
    pub fn http_default() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(30), 3)
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.max_retries).unwrap_or(u32::MAX).saturating_add(1)
    }

    fn constant_builder(delay: Duration, max_retries: usize, jitter: bool) -> ConstantBuilder {
        let builder = ConstantBuilder::default()
            .with_delay(delay)
            .with_max_times(max_retries);
        if jitter { builder.with_jitter() } else { builder }
    }

    fn exponential_builder(
        min: Duration,
        max: Duration,
        max_retries: usize,
        jitter: bool,
    ) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(min)
            .with_max_delay(max)
            .with_max_times(max_retries);
        if jitter { builder.with_jitter() } else { builder }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::http_default()
    }
}

/// Run `operation` until it succeeds, the policy is exhausted, or
/// `is_retryable` rejects an error.
///
/// `label` identifies the operation in logs and in
/// [`SyncProgress::Retrying`] events. The last error is returned unchanged
/// once retries run out.
pub async fn with_retry<T, E, F, Fut, P>(
    operation: F,
    policy: &RetryPolicy,
    is_retryable: P,
    label: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    match policy.backoff {
        Backoff::Constant(delay) => {
            let builder =
                RetryPolicy::constant_builder(delay, policy.max_retries, policy.with_jitter);
            run(operation, builder, is_retryable, label, on_progress).await
        }
        Backoff::Exponential { min, max } => {
            let builder =
                RetryPolicy::exponential_builder(min, max, policy.max_retries, policy.with_jitter);
            run(operation, builder, is_retryable, label, on_progress).await
        }
    }
}

async fn run<T, E, F, Fut, P, B>(
    mut operation: F,
    builder: B,
    is_retryable: P,
    label: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
    B: BackoffBuilder,
{
    let attempt = AtomicU32::new(0);

    let attempt_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    attempt_op
        .retry(builder)
        .notify(|err, dur| {
            let current = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(SyncProgress::Retrying {
                    label: label.to_string(),
                    attempt: current,
                    retry_after_ms: dur.as_millis() as u64,
                    error: err.to_string(),
                });
            }
            tracing::debug!(
                label,
                attempt = current,
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "retrying after failure"
            );
        })
        .when(|e| is_retryable(e))
        .await
}
