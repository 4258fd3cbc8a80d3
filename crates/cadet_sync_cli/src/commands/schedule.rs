//! Scheduled job management and the cron loop.

use cadet_sync::ScheduledJobModel;
use cadet_sync::repository::schedule;
use cadet_sync::scheduler::{Scheduler, parse_cron};
use chrono::Utc;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::OutputFormat;
use super::shared::{CliResult, Runtime, open_db, print_ok, print_rows};
use crate::config::Config;
use crate::shutdown::shutdown_flag;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// List scheduled jobs with their next fire time
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Run the scheduler until interrupted
    Run,
    /// Enable a scheduled job
    Enable { name: String },
    /// Disable a scheduled job
    Disable { name: String },
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct ScheduleDisplay {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cron")]
    cron: String,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Arguments")]
    kwargs: String,
    #[tabled(rename = "Enabled")]
    enabled: bool,
    #[tabled(rename = "Last run")]
    last_run: String,
    #[tabled(rename = "Next run")]
    next_run: String,
}

impl From<&ScheduledJobModel> for ScheduleDisplay {
    fn from(job: &ScheduledJobModel) -> Self {
        let next_run = match parse_cron(&job.name, &job.cron) {
            Ok(schedule) if job.enabled => schedule
                .after(&Utc::now())
                .next()
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
            Ok(_) => "-".to_string(),
            Err(_) => "invalid cron".to_string(),
        };
        Self {
            name: job.name.clone(),
            cron: job.cron.clone(),
            task: job.task.clone(),
            kwargs: job.kwargs.to_string(),
            enabled: job.enabled,
            last_run: job
                .last_run_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
            next_run,
        }
    }
}

pub async fn handle_schedule(
    action: ScheduleAction,
    config: &Config,
    database_url: &str,
) -> CliResult {
    match action {
        ScheduleAction::Run => {
            let runtime = Runtime::open(config, database_url).await?;
            run_loop(&runtime).await
        }
        ScheduleAction::List { output } => {
            let db = open_db(database_url).await?;
            let jobs = schedule::list(&db).await?;
            print_rows(jobs.iter().map(ScheduleDisplay::from).collect(), output)
        }
        ScheduleAction::Enable { name } => set_enabled(database_url, &name, true).await,
        ScheduleAction::Disable { name } => set_enabled(database_url, &name, false).await,
    }
}

async fn set_enabled(database_url: &str, name: &str, enabled: bool) -> CliResult {
    let db = open_db(database_url).await?;
    schedule::set_enabled(&db, name, enabled).await?;
    let state = if enabled { "enabled" } else { "disabled" };
    print_ok(format!("job '{name}' {state}"));
    Ok(())
}

/// Run the cron loop until Ctrl+C.
async fn run_loop(runtime: &Runtime) -> CliResult {
    let jobs = runtime.jobs();
    tracing::info!("scheduler started");
    let fired = Scheduler::new(&runtime.db, &jobs, shutdown_flag())
        .run()
        .await?;
    print_ok(format!("scheduler stopped after {fired} jobs"));
    Ok(())
}
