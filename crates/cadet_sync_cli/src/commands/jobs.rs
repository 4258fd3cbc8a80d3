//! Commands that run a job once: profile sync, redistribution and the
//! blackhole report.

use cadet_sync::SyncPipeline;
use cadet_sync::jobs::{RedistributionReport, Transfer};
use chrono::Utc;
use serde::Serialize;
use tabled::Tabled;

use super::OutputFormat;
use super::shared::{CliResult, Runtime, print_ok, print_rows};
use crate::progress::LoggingReporter;

#[derive(Debug, Clone, Serialize, Tabled)]
struct TransferDisplay {
    #[tabled(rename = "Login")]
    login: String,
    #[tabled(rename = "Balance")]
    balance: i64,
    #[tabled(rename = "Given")]
    points: i64,
}

impl From<&Transfer> for TransferDisplay {
    fn from(transfer: &Transfer) -> Self {
        Self {
            login: transfer.login.clone(),
            balance: transfer.balance,
            points: transfer.points,
        }
    }
}

/// Sync the configured tracks, or `tracks` when given.
pub(crate) async fn handle_sync(runtime: &Runtime, tracks: Vec<i64>) -> CliResult {
    let track_ids = if tracks.is_empty() {
        runtime.settings.sync.track_ids.clone()
    } else {
        tracks
    };

    let reporter = LoggingReporter::new().into_callback();
    let result = SyncPipeline::new(&runtime.client, &runtime.db, &runtime.settings)
        .with_progress(Some(&reporter))
        .run_tracks(&track_ids, Utc::now())
        .await?;

    if result.snapshots_skipped > 0 {
        tracing::warn!(
            skipped = result.snapshots_skipped,
            "snapshots already present for this capture time"
        );
    }
    print_ok(format!("sync: {}", result.summary()));
    Ok(())
}

pub(crate) async fn handle_redistribute(
    runtime: &Runtime,
    target: Option<i64>,
    dry_run: bool,
    output: OutputFormat,
) -> CliResult {
    let target = target.unwrap_or(runtime.settings.redistribution.target);
    let report = runtime.jobs().redistribute(target, dry_run).await?;

    if !report.transfers.is_empty() {
        print_rows(
            report.transfers.iter().map(TransferDisplay::from).collect(),
            output,
        )?;
    }
    print_ok(redistribution_summary(&report));
    Ok(())
}

fn redistribution_summary(report: &RedistributionReport) -> String {
    let mut line = format!(
        "redistribution: {} points pooled from {} cadets above {}",
        report.total_points,
        report.transfers.len(),
        report.target
    );
    if !report.blackholed.is_empty() {
        line.push_str(&format!(", {} blackholed skipped", report.blackholed.len()));
    }
    if report.dry_run {
        line.push_str(" (dry run)");
    }
    line
}

pub(crate) async fn handle_blackhole_report(runtime: &Runtime) -> CliResult {
    let report = runtime.jobs().blackhole_report().await?;
    print_ok(format!(
        "blackhole report: {} tracked, {} within 14 days, {} in 14 to 30 days, {} within 45 days",
        report.tracked,
        report.within_14_days,
        report.within_14_to_30_days,
        report.within_45_days
    ));
    Ok(())
}
