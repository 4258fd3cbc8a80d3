//! Retry-and-notify wrapper for scheduled tasks.
//!
//! A task is run once, then retried with a constant delay. Every failed
//! attempt is announced on the task's webhook; a success sends a one-line
//! "ok". The runner never returns an error: callers inspect the
//! [`TaskOutcome`].

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::notify::{Channel, Notification};
use crate::retry::{RetryPolicy, with_retry};
use crate::settings::SchedulerSettings;

/// Result of a task after all attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Failed { attempts: u32, error: String },
}

impl<T> TaskOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            TaskOutcome::Succeeded { attempts, .. } | TaskOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            TaskOutcome::Succeeded { value, .. } => Some(value),
            TaskOutcome::Failed { .. } => None,
        }
    }
}

pub struct TaskRunner<'a> {
    channel: Channel<'a>,
    policy: RetryPolicy,
}

impl<'a> TaskRunner<'a> {
    #[must_use]
    pub fn new(channel: Channel<'a>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    /// Runner using the scheduler's retry delay and retry count.
    #[must_use]
    pub fn from_settings(channel: Channel<'a>, settings: &SchedulerSettings) -> Self {
        Self::new(
            channel,
            RetryPolicy::constant(settings.retry_delay(), settings.max_retries),
        )
    }

    /// Run `operation` under the retry policy, notifying on every outcome.
    pub async fn run<T, E, F, Fut>(&self, task: &str, mut operation: F) -> TaskOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.policy.max_attempts();
        let channel = &self.channel;

        let attempt = || {
            let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = operation();
            async move {
                let result = fut.await;
                if let Err(e) = &result {
                    tracing::warn!(task, attempt = current, max_attempts, error = %e, "task attempt failed");
                    channel
                        .send_logged(&Notification::message(format!(
                            "{task} failed (attempt {current}/{max_attempts}): {e}"
                        )))
                        .await;
                }
                result
            }
        };

        let result = with_retry(attempt, &self.policy, |_: &E| true, task, None).await;
        let attempts = attempts.load(Ordering::SeqCst);

        match result {
            Ok(value) => {
                tracing::info!(task, attempts, "task succeeded");
                channel
                    .send_logged(&Notification::message(format!("{task}: ok")))
                    .await;
                TaskOutcome::Succeeded { value, attempts }
            }
            Err(e) => {
                tracing::error!(task, attempts, error = %e, "task failed, giving up");
                channel
                    .send_logged(&Notification::message(format!(
                        "{task} gave up after {attempts} attempts"
                    )))
                    .await;
                TaskOutcome::Failed {
                    attempts,
                    error: e.to_string(),
                }
            }
        }
    }
}
