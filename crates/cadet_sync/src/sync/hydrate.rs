//! Staggered fan-out of per-login detail fetches.
//!
//! One task per id, launched `stagger` apart, each with its own retry loop.
//! Every launched task is joined before [`DetailFetcher::fetch_all`] returns,
//! and a single exhausted task fails the whole batch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::task::{Id as TaskId, JoinSet};

use super::progress::{ProgressCallback, SyncProgress, emit};
use crate::intra::HttpError;
use crate::retry::{RetryPolicy, with_retry};

/// A detail fetch that could not be completed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching {id} failed after {attempts} attempts: {source}")]
    Exhausted {
        id: String,
        attempts: u32,
        #[source]
        source: HttpError,
    },

    #[error("fetch task for {id} panicked or was cancelled: {message}")]
    Aborted { id: String, message: String },
}

impl FetchError {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            FetchError::Exhausted { id, .. } | FetchError::Aborted { id, .. } => id,
        }
    }
}

/// One hydrated record.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub id: String,
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct DetailFetcher {
    stagger: Duration,
    policy: RetryPolicy,
}

impl Default for DetailFetcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl DetailFetcher {
    /// Fetcher launching one task every `stagger`, with the detail retry
    /// policy (1 s apart, 10 retries).
    #[must_use]
    pub fn new(stagger: Duration) -> Self {
        Self {
            stagger,
            policy: RetryPolicy::detail_fetch(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Fetch every id with `fetch_one`.
    ///
    /// Results come back in completion order, not in `ids` order. Every error
    /// from `fetch_one` is retried until the policy runs out.
    pub async fn fetch_all<T, F, Fut>(
        &self,
        ids: Vec<String>,
        fetch_one: F,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Fetched<T>>, FetchError>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HttpError>> + Send + 'static,
    {
        emit(
            on_progress,
            SyncProgress::HydratingDetails {
                count: ids.len(),
                stagger_ms: self.stagger.as_millis() as u64,
            },
        );

        let mut tasks: JoinSet<Result<Fetched<T>, FetchError>> = JoinSet::new();
        let mut launched: HashMap<TaskId, String> = HashMap::with_capacity(ids.len());

        for (index, id) in ids.into_iter().enumerate() {
            if index > 0 && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }

            let fetch_one = fetch_one.clone();
            let policy = self.policy.clone();
            let task_id = id.clone();
            let handle = tasks.spawn(async move {
                let attempts = AtomicU32::new(0);
                let label = format!("fetch {task_id}");
                let result = with_retry(
                    || {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        fetch_one(task_id.clone())
                    },
                    &policy,
                    |err: &HttpError| !matches!(err, HttpError::Auth(_)),
                    &label,
                    None,
                )
                .await;
                let attempts = attempts.load(Ordering::SeqCst);

                match result {
                    Ok(value) => Ok(Fetched {
                        id: task_id,
                        value,
                        attempts,
                    }),
                    Err(source) => Err(FetchError::Exhausted {
                        id: task_id,
                        attempts,
                        source,
                    }),
                }
            });
            launched.insert(handle.id(), id);
        }

        let mut fetched = Vec::with_capacity(launched.len());
        let mut first_error: Option<FetchError> = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|join_err| {
                Err(FetchError::Aborted {
                    id: launched.get(&join_err.id()).cloned().unwrap_or_default(),
                    message: join_err.to_string(),
                })
            });

            match outcome {
                Ok(record) => {
                    emit(
                        on_progress,
                        SyncProgress::DetailFetched {
                            login: record.id.clone(),
                            attempts: record.attempts,
                        },
                    );
                    fetched.push(record);
                }
                Err(err) => {
                    tracing::warn!(id = err.id(), error = %err, "detail fetch failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(fetched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::AuthError;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn unavailable(id: &str) -> HttpError {
        HttpError::Status {
            status: 503,
            url: format!("https://api.example/users/{id}"),
            body: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_fetch_is_attempted_eleven_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let err = DetailFetcher::new(Duration::ZERO)
            .fetch_all(
                vec!["jdoe".to_string()],
                move |id: String| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(unavailable(&id))
                    }
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 11);
        match err {
            FetchError::Exhausted { id, attempts, .. } => {
                assert_eq!(id, "jdoe");
                assert_eq!(attempts, 11);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_third_attempt_is_returned() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let fetched = DetailFetcher::new(Duration::ZERO)
            .fetch_all(
                vec!["jdoe".to_string()],
                move |id: String| {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(unavailable(&id))
                        } else {
                            Ok(id.to_uppercase())
                        }
                    }
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].value, "JDOE");
        assert_eq!(fetched[0].attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn launches_are_staggered() {
        let started = Instant::now();
        let launches: Arc<Mutex<Vec<(String, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&launches);

        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let fetched = DetailFetcher::new(Duration::from_millis(500))
            .fetch_all(
                ids,
                move |id: String| {
                    let sink = Arc::clone(&sink);
                    async move {
                        sink.lock().unwrap().push((id.clone(), started.elapsed()));
                        Ok::<_, HttpError>(id)
                    }
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(fetched.len(), 3);
        let mut launches = launches.lock().unwrap().clone();
        launches.sort_by_key(|(_, at)| *at);
        let offsets: Vec<u128> = launches.iter().map(|(_, at)| at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 500, 1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_fails_the_batch_after_all_tasks_finish() {
        let finished = Arc::new(AtomicU32::new(0));
        let done = Arc::clone(&finished);

        let ids: Vec<String> = ["bad", "slow"].iter().map(|s| s.to_string()).collect();
        let err = DetailFetcher::new(Duration::ZERO)
            .with_policy(RetryPolicy::none())
            .fetch_all(
                ids,
                move |id: String| {
                    let done = Arc::clone(&done);
                    async move {
                        if id == "bad" {
                            return Err(unavailable(&id));
                        }
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(id)
                    }
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.id(), "bad");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn token_failure_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let err = DetailFetcher::new(Duration::ZERO)
            .fetch_all(
                vec!["jdoe".to_string()],
                move |_id: String| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(HttpError::Auth(AuthError::Rejected {
                            status: 503,
                            body: String::new(),
                        }))
                    }
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            FetchError::Exhausted { attempts, source, .. } => {
                assert_eq!(attempts, 1);
                assert!(matches!(source, HttpError::Auth(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_returns_nothing() {
        let fetched = DetailFetcher::default()
            .fetch_all(Vec::new(), |id: String| async move { Ok::<_, HttpError>(id) }, None)
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }
}
