//! Progress reporting for sync runs.
//!
//! Sync events are mapped onto structured `tracing` records: milestones at
//! info level, per-page and per-cadet events at debug level.

use cadet_sync::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Boxed callback to hand to the sync pipeline.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ListingTrack {
                track_id,
                pool_window,
            } => {
                tracing::info!(track_id, pool_window, "Listing track");
            }

            SyncProgress::FetchedPage {
                endpoint,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(endpoint = %endpoint, page, count, total_so_far, "Fetched page");
            }

            SyncProgress::ListingComplete {
                track_id,
                total,
                kept,
            } => {
                tracing::info!(track_id, total, kept, "Listing complete");
            }

            SyncProgress::CandidatesReady { count } => {
                tracing::info!(count, "Candidates ready");
            }

            SyncProgress::HydratingDetails { count, stagger_ms } => {
                tracing::info!(count, stagger_ms, "Fetching profile details");
            }

            SyncProgress::DetailFetched { login, attempts } => {
                if attempts > 1 {
                    tracing::info!(login = %login, attempts, "Fetched profile after retries");
                } else {
                    tracing::debug!(login = %login, "Fetched profile");
                }
            }

            SyncProgress::ProfileUpserted { login, created } => {
                tracing::debug!(login = %login, created, "Saved profile");
            }

            SyncProgress::SnapshotsPersisted { inserted, skipped } => {
                tracing::info!(inserted, skipped, "Snapshots persisted");
            }

            SyncProgress::Retrying {
                label,
                attempt,
                retry_after_ms,
                error,
            } => {
                tracing::warn!(label = %label, attempt, retry_after_ms, error = %error, "Retrying");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!("{}", message);
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
