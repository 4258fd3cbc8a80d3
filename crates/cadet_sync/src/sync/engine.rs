//! Profile sync pipeline.
//!
//! 1. list every track with the campus filter, windowing pool tracks
//! 2. union the kept logins
//! 3. hydrate each login's detail record ([`DetailFetcher`])
//! 4. upsert the profile summary, keyed by Intra user id
//! 5. bulk-insert one snapshot per profile, skipping conflicts
//!
//! Each write is its own statement, so an interrupted run leaves the store
//! consistent and the next run picks up where it stopped.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::Value;

use super::hydrate::DetailFetcher;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{SyncError, SyncResult};
use super::window::in_pool_window;
use crate::intra::{Filters, IntraClient, UserDetail};
use crate::repository::{profile, snapshot};
use crate::retry::RetryPolicy;
use crate::settings::Settings;

pub struct SyncPipeline<'a> {
    client: &'a IntraClient,
    db: &'a DatabaseConnection,
    settings: &'a Settings,
    fetcher: DetailFetcher,
    persist_retry: RetryPolicy,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a> SyncPipeline<'a> {
    #[must_use]
    pub fn new(client: &'a IntraClient, db: &'a DatabaseConnection, settings: &'a Settings) -> Self {
        Self {
            client,
            db,
            settings,
            fetcher: DetailFetcher::new(settings.sync.stagger()),
            persist_retry: RetryPolicy::constant(std::time::Duration::from_secs(1), 3),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: DetailFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_persist_retry(mut self, policy: RetryPolicy) -> Self {
        self.persist_retry = policy;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Sync the configured tracks now.
    pub async fn run(&self) -> Result<SyncResult, SyncError> {
        self.run_tracks(&self.settings.sync.track_ids, Utc::now()).await
    }

    /// Sync `track_ids`, stamping every snapshot with `now`.
    pub async fn run_tracks(
        &self,
        track_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<SyncResult, SyncError> {
        let logins = self.candidates(track_ids, now).await?;
        let mut result = SyncResult::empty(now);
        result.candidates = logins.len();
        emit(
            self.on_progress,
            SyncProgress::CandidatesReady {
                count: logins.len(),
            },
        );

        if logins.is_empty() {
            tracing::info!("no candidates to sync");
            return Ok(result);
        }

        // Detail fetches carry their own retry budget.
        let client = self.client.clone().with_retry_policy(RetryPolicy::none());
        let fetched = self
            .fetcher
            .fetch_all(
                logins.into_iter().collect(),
                move |login: String| {
                    let client = client.clone();
                    async move { client.user_raw(&login).await }
                },
                self.on_progress,
            )
            .await?;
        result.fetched = fetched.len();

        let mut snapshots = Vec::with_capacity(fetched.len());
        for record in fetched {
            let detail = parse_detail(&record.id, &record.value)?;
            let outcome =
                profile::upsert(self.db, profile::active_model_from_detail(&detail, now)).await?;
            if outcome.was_created() {
                result.profiles_created += 1;
            } else {
                result.profiles_updated += 1;
            }
            emit(
                self.on_progress,
                SyncProgress::ProfileUpserted {
                    login: detail.login.clone(),
                    created: outcome.was_created(),
                },
            );
            snapshots.push(snapshot::new_snapshot(
                outcome.model().id,
                now,
                record.value,
            ));
        }

        let inserted =
            snapshot::insert_many_with_retry(self.db, snapshots, &self.persist_retry).await?;
        result.snapshots_inserted = inserted.inserted;
        result.snapshots_skipped = inserted.skipped;
        emit(
            self.on_progress,
            SyncProgress::SnapshotsPersisted {
                inserted: inserted.inserted,
                skipped: inserted.skipped,
            },
        );

        tracing::info!(
            candidates = result.candidates,
            created = result.profiles_created,
            updated = result.profiles_updated,
            snapshots = result.snapshots_inserted,
            skipped = result.snapshots_skipped,
            "profile sync complete"
        );
        Ok(result)
    }

    /// Distinct logins of every track, pool tracks restricted to the window.
    async fn candidates(
        &self,
        track_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, SyncError> {
        let filters = Filters::new().campus(self.settings.intra.campus_id);
        let today = now.date_naive();
        let mut logins = BTreeSet::new();

        for &track_id in track_ids {
            let windowed = self.settings.sync.is_pool_track(track_id);
            emit(
                self.on_progress,
                SyncProgress::ListingTrack {
                    track_id,
                    pool_window: windowed,
                },
            );

            let users = self
                .client
                .cursus_users(track_id, &filters, self.on_progress)
                .await?;
            let total = users.len();
            let mut kept = 0;
            for user in users {
                if windowed
                    && !in_pool_window(
                        user.pool_month.as_deref(),
                        user.pool_year.as_deref(),
                        today,
                        self.settings.sync.window_months,
                    )
                {
                    continue;
                }
                kept += 1;
                logins.insert(user.login);
            }

            tracing::debug!(track_id, total, kept, "track listed");
            emit(
                self.on_progress,
                SyncProgress::ListingComplete {
                    track_id,
                    total,
                    kept,
                },
            );
        }

        Ok(logins)
    }
}

fn parse_detail(login: &str, payload: &Value) -> Result<UserDetail, SyncError> {
    UserDetail::deserialize(payload).map_err(|e| SyncError::Decode {
        login: login.to_string(),
        message: e.to_string(),
    })
}
