//! Jobs run from the CLI or the scheduler.
//!
//! - [`runner`] - [`TaskRunner`]: retry-and-notify wrapper
//! - [`redistribution`] - [`RedistributionJob`]: pool the excess correction points
//! - [`blackhole`] - blackhole deadline report
//!
//! [`JobContext`] bundles the shared collaborators and maps scheduled task
//! names to these jobs.

pub mod blackhole;
mod error;
pub mod redistribution;
pub mod runner;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::Value;

pub use blackhole::{BlackholeEntry, BlackholeReport};
pub use error::JobError;
pub use redistribution::{RedistributionJob, RedistributionReport, Transfer, select_candidates};
pub use runner::{TaskOutcome, TaskRunner};

pub use crate::notify::ConfigError;

use crate::intra::IntraClient;
use crate::notify::{Channel, Notifier};
use crate::scheduler::JobDispatcher;
use crate::settings::Settings;
use crate::sync::{ProgressCallback, SyncPipeline, SyncResult};

/// Scheduled task name of the profile sync.
pub const SYNC_TASK: &str = "sync-profiles";
/// Scheduled task name of the redistribution job.
pub const REDISTRIBUTE_TASK: &str = "redistribute-points";
/// Scheduled task name of the blackhole report.
pub const BLACKHOLE_REPORT_TASK: &str = "blackhole-report";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RedistributeKwargs {
    target: Option<i64>,
    dry_run: bool,
}

/// Collaborators shared by every job.
pub struct JobContext<'a> {
    client: &'a IntraClient,
    db: &'a DatabaseConnection,
    notifier: &'a dyn Notifier,
    settings: &'a Settings,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a> JobContext<'a> {
    #[must_use]
    pub fn new(
        client: &'a IntraClient,
        db: &'a DatabaseConnection,
        notifier: &'a dyn Notifier,
        settings: &'a Settings,
    ) -> Self {
        Self {
            client,
            db,
            notifier,
            settings,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Profile sync under the [`TaskRunner`], reporting to the sync webhook.
    pub async fn sync_profiles(&self) -> Result<TaskOutcome<SyncResult>, JobError> {
        let channel =
            Channel::resolve(self.db, self.notifier, &self.settings.scheduler.sync_webhook).await?;
        let runner = TaskRunner::from_settings(channel, &self.settings.scheduler);

        let (client, db, settings, on_progress) =
            (self.client, self.db, self.settings, self.on_progress);
        Ok(runner
            .run(SYNC_TASK, move || async move {
                SyncPipeline::new(client, db, settings)
                    .with_progress(on_progress)
                    .run()
                    .await
            })
            .await)
    }

    pub async fn redistribute(
        &self,
        target: i64,
        dry_run: bool,
    ) -> Result<RedistributionReport, JobError> {
        RedistributionJob::new(
            self.client,
            self.db,
            self.notifier,
            &self.settings.redistribution,
            self.settings.intra.campus_id,
        )
        .run(target, dry_run)
        .await
    }

    pub async fn blackhole_report(&self) -> Result<BlackholeReport, JobError> {
        blackhole::run(
            self.db,
            self.notifier,
            &self.settings.redistribution,
            Utc::now(),
        )
        .await
    }

    fn redistribute_kwargs(&self, kwargs: &Value) -> Result<(i64, bool), JobError> {
        let parsed: RedistributeKwargs = if kwargs.is_null() {
            RedistributeKwargs::default()
        } else {
            serde_json::from_value(kwargs.clone())
                .map_err(|e| JobError::invalid_kwargs(REDISTRIBUTE_TASK, e.to_string()))?
        };
        Ok((
            parsed.target.unwrap_or(self.settings.redistribution.target),
            parsed.dry_run,
        ))
    }
}

#[async_trait]
impl JobDispatcher for JobContext<'_> {
    async fn dispatch(&self, task: &str, kwargs: &Value) -> Result<String, JobError> {
        match task {
            SYNC_TASK => Ok(match self.sync_profiles().await? {
                TaskOutcome::Succeeded { value, attempts } => {
                    format!("{} (attempts: {attempts})", value.summary())
                }
                TaskOutcome::Failed { attempts, error } => {
                    format!("gave up after {attempts} attempts: {error}")
                }
            }),
            REDISTRIBUTE_TASK => {
                let (target, dry_run) = self.redistribute_kwargs(kwargs)?;
                let report = self.redistribute(target, dry_run).await?;
                Ok(format!(
                    "{} points pooled from {} users",
                    report.total_points,
                    report.transfers.len()
                ))
            }
            BLACKHOLE_REPORT_TASK => {
                let report = self.blackhole_report().await?;
                Ok(format!("{} upcoming blackholes reported", report.tracked))
            }
            other => Err(JobError::UnknownTask(other.to_string())),
        }
    }
}
