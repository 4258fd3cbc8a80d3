//! Cron loop over the enabled `scheduled_jobs` rows.
//!
//! Expressions use the `cron` crate syntax (seconds first) and are evaluated
//! in UTC. Due jobs run one after another; a failing job is logged and does
//! not stop the loop.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use thiserror::Error;

use crate::entity::scheduled_job::Model as ScheduledJob;
use crate::jobs::JobError;
use crate::repository::{RepositoryError, schedule};

/// Runs a named task with its stored keyword arguments.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Returns a one-line summary of what the task did.
    async fn dispatch(&self, task: &str, kwargs: &Value) -> Result<String, JobError>;
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}' for job '{name}': {message}")]
    InvalidCron {
        name: String,
        expression: String,
        message: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub fn parse_cron(name: &str, expression: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron {
        name: name.to_string(),
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// A job row with its parsed schedule.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub job: ScheduledJob,
    pub schedule: Schedule,
}

impl ScheduleEntry {
    /// First fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Parse every job; rows with an invalid expression are logged and dropped.
#[must_use]
pub fn load_entries(jobs: Vec<ScheduledJob>) -> Vec<ScheduleEntry> {
    jobs.into_iter()
        .filter_map(|job| match parse_cron(&job.name, &job.cron) {
            Ok(schedule) => Some(ScheduleEntry { job, schedule }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping scheduled job");
                None
            }
        })
        .collect()
}

/// Earliest fire time of any entry strictly after `after`.
#[must_use]
pub fn next_fire(entries: &[ScheduleEntry], after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    entries.iter().filter_map(|e| e.next_after(after)).min()
}

/// Entries with a fire time in `(since, until]`.
#[must_use]
pub fn due_between(
    entries: &[ScheduleEntry],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<&ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.next_after(since).is_some_and(|t| t <= until))
        .collect()
}

/// Outcome of one fired job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    pub name: String,
    pub task: String,
    pub outcome: Result<String, String>,
}

pub struct Scheduler<'a> {
    db: &'a DatabaseConnection,
    dispatcher: &'a dyn JobDispatcher,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl<'a> Scheduler<'a> {
    #[must_use]
    pub fn new(
        db: &'a DatabaseConnection,
        dispatcher: &'a dyn JobDispatcher,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            shutdown,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Longest single sleep; bounds how late a shutdown request is noticed.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run until the shutdown flag is raised; returns the number of jobs fired.
    pub async fn run(&self) -> Result<usize, SchedulerError> {
        let mut since = Utc::now();
        let mut fired = 0;

        while !self.stopping() {
            let entries = load_entries(schedule::list_enabled(self.db).await?);
            let Some(next) = next_fire(&entries, since) else {
                tracing::debug!("no enabled jobs, waiting");
                tokio::time::sleep(self.poll_interval).await;
                since = Utc::now();
                continue;
            };

            tracing::debug!(next = %next, "waiting for next job");
            if !self.sleep_until(next).await {
                break;
            }

            fired += self.run_window(&entries, since, next).await.len();
            since = next;
        }

        tracing::info!(fired, "scheduler stopped");
        Ok(fired)
    }

    /// Sleep in `poll_interval` steps; false if shutdown was requested.
    async fn sleep_until(&self, at: DateTime<Utc>) -> bool {
        loop {
            if self.stopping() {
                return false;
            }
            let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return true;
            }
            tokio::time::sleep(remaining.min(self.poll_interval)).await;
        }
    }

    /// Fire every entry due in `(since, until]` and record `until` as its
    /// last run.
    pub async fn run_window(
        &self,
        entries: &[ScheduleEntry],
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<JobRun> {
        let mut runs = Vec::new();
        for entry in due_between(entries, since, until) {
            let job = &entry.job;
            tracing::info!(job = %job.name, task = %job.task, "running scheduled job");

            let outcome = match self.dispatcher.dispatch(&job.task, &job.kwargs).await {
                Ok(summary) => {
                    tracing::info!(job = %job.name, %summary, "scheduled job finished");
                    Ok(summary)
                }
                Err(e) => {
                    tracing::error!(job = %job.name, error = %e, "scheduled job failed");
                    Err(e.to_string())
                }
            };

            if let Err(e) = schedule::mark_run(self.db, job.id, until).await {
                tracing::warn!(job = %job.name, error = %e, "failed to record last run");
            }

            runs.push(JobRun {
                name: job.name.clone(),
                task: job.task.clone(),
                outcome,
            });
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn job(name: &str, cron: &str, task: &str) -> ScheduledJob {
        ScheduledJob {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cron: cron.to_string(),
            task: task.to_string(),
            kwargs: json!({}),
            enabled: true,
            last_run_at: None,
        }
    }

    fn friday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn invalid_expressions_are_dropped() {
        let entries = load_entries(vec![
            job("weekly", "0 42 7 * * Mon", "redistribute-points"),
            job("broken", "every monday", "sync-profiles"),
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].job.name, "weekly");
        assert!(matches!(
            parse_cron("broken", "every monday"),
            Err(SchedulerError::InvalidCron { .. })
        ));
    }

    #[test]
    fn next_fire_is_exclusive_and_picks_earliest() {
        let entries = load_entries(vec![
            job("weekly", "0 42 7 * * Mon", "redistribute-points"),
            job("daily", "0 0 10 * * *", "sync-profiles"),
        ]);

        assert_eq!(
            entries[0].next_after(friday()),
            Some(Utc.with_ymd_and_hms(2024, 3, 18, 7, 42, 0).unwrap())
        );
        assert_eq!(
            next_fire(&entries, friday()),
            Some(Utc.with_ymd_and_hms(2024, 3, 16, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn due_between_selects_jobs_in_window() {
        let entries = load_entries(vec![
            job("weekly", "0 42 7 * * Mon", "redistribute-points"),
            job("daily", "0 0 10 * * *", "sync-profiles"),
        ]);
        let monday_morning = Utc.with_ymd_and_hms(2024, 3, 18, 8, 0, 0).unwrap();

        let due: Vec<&str> = due_between(&entries, friday(), monday_morning)
            .into_iter()
            .map(|e| e.job.name.as_str())
            .collect();
        assert_eq!(due, vec!["weekly", "daily"]);

        let saturday = Utc.with_ymd_and_hms(2024, 3, 16, 9, 0, 0).unwrap();
        assert!(due_between(&entries, friday(), saturday).is_empty());
    }
}
