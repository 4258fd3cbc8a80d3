use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Alias, Expr, Func, OnConflict, Query},
};
use uuid::Uuid;

use crate::entity::profile_snapshot::{ActiveModel, Column, Entity as ProfileSnapshot, Model};
use crate::entity::profile_summary::{
    Column as ProfileColumn, Entity as ProfileSummary, Model as ProfileModel,
};
use crate::retry::{RetryPolicy, with_retry};

use super::errors::{RepositoryError, Result};

/// Rows written by a bulk snapshot insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    /// Rows dropped because a snapshot with the same profile and capture
    /// time already existed.
    pub skipped: u64,
}

#[must_use]
pub fn new_snapshot(
    profile_id: Uuid,
    captured_at: DateTime<Utc>,
    payload: serde_json::Value,
) -> ActiveModel {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        profile_id: Set(profile_id),
        captured_at: Set(captured_at.fixed_offset()),
        payload: Set(payload),
    }
}

/// Insert all snapshots in one statement, silently skipping rows that
/// collide on `(profile_id, captured_at)`.
pub async fn insert_many(db: &DatabaseConnection, models: Vec<ActiveModel>) -> Result<InsertOutcome> {
    if models.is_empty() {
        return Ok(InsertOutcome::default());
    }

    let attempted = models.len() as u64;
    let inserted = ProfileSnapshot::insert_many(models)
        .on_conflict(
            OnConflict::columns([Column::ProfileId, Column::CapturedAt])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(InsertOutcome {
        inserted,
        skipped: attempted.saturating_sub(inserted),
    })
}

/// [`insert_many`] with retries on transient database errors (locks, dropped
/// connections).
pub async fn insert_many_with_retry(
    db: &DatabaseConnection,
    models: Vec<ActiveModel>,
    policy: &RetryPolicy,
) -> Result<InsertOutcome> {
    with_retry(
        || insert_many(db, models.clone()),
        policy,
        RepositoryError::is_retryable,
        "insert profile snapshots",
        None,
    )
    .await
}

/// Newest snapshot of the profile with this login.
pub async fn latest_for_login(db: &DatabaseConnection, login: &str) -> Result<Option<Model>> {
    ProfileSnapshot::find()
        .inner_join(ProfileSummary)
        .filter(ProfileColumn::Login.eq(login))
        .order_by_desc(Column::CapturedAt)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn latest_for_profile(db: &DatabaseConnection, profile_id: Uuid) -> Result<Option<Model>> {
    ProfileSnapshot::find()
        .filter(Column::ProfileId.eq(profile_id))
        .order_by_desc(Column::CapturedAt)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn count_for_profile(db: &DatabaseConnection, profile_id: Uuid) -> Result<u64> {
    ProfileSnapshot::find()
        .filter(Column::ProfileId.eq(profile_id))
        .count(db)
        .await
        .map_err(RepositoryError::from)
}

/// The newest snapshot of every profile, optionally restricted to profiles
/// enrolled in `track_id`. Ordered by login.
pub async fn latest_per_profile(
    db: &DatabaseConnection,
    track_id: Option<i64>,
) -> Result<Vec<(ProfileModel, Model)>> {
    let newer = Alias::new("newer");
    let max_captured = Query::select()
        .expr(Func::max(Expr::col((newer.clone(), Column::CapturedAt))))
        .from_as(ProfileSnapshot, newer.clone())
        .and_where(
            Expr::col((newer.clone(), Column::ProfileId))
                .equals((ProfileSnapshot, Column::ProfileId)),
        )
        .to_owned();

    let rows = ProfileSnapshot::find()
        .filter(Expr::col((ProfileSnapshot, Column::CapturedAt)).in_subquery(max_captured))
        .find_also_related(ProfileSummary)
        .all(db)
        .await?;

    let mut latest: Vec<(ProfileModel, Model)> = rows
        .into_iter()
        .filter_map(|(snapshot, profile)| profile.map(|p| (p, snapshot)))
        .filter(|(profile, _)| track_id.is_none_or(|t| profile.in_track(t)))
        .collect();
    latest.sort_by(|a, b| a.0.login.cmp(&b.0.login));
    Ok(latest)
}
