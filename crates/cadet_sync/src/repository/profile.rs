use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::profile_summary::{ActiveModel, Column, Entity as ProfileSummary, Model};
use crate::intra::UserDetail;

use super::errors::{RepositoryError, Result};

/// Whether an upsert created a new row or updated an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Model),
    Updated(Model),
}

impl UpsertOutcome {
    #[must_use]
    pub fn model(&self) -> &Model {
        match self {
            UpsertOutcome::Created(m) | UpsertOutcome::Updated(m) => m,
        }
    }

    #[must_use]
    pub fn into_model(self) -> Model {
        match self {
            UpsertOutcome::Created(m) | UpsertOutcome::Updated(m) => m,
        }
    }

    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Build the summary row for a detail record.
#[must_use]
pub fn active_model_from_detail(detail: &UserDetail, now: DateTime<Utc>) -> ActiveModel {
    let now = now.fixed_offset();
    ActiveModel {
        id: Set(Uuid::new_v4()),
        external_id: Set(detail.id),
        login: Set(detail.login.clone()),
        pool_month: Set(detail.pool_month.clone()),
        pool_year: Set(detail.pool_year.clone()),
        track_ids: Set(serde_json::json!(detail.track_ids())),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

pub async fn find_by_external_id(db: &DatabaseConnection, external_id: i64) -> Result<Option<Model>> {
    ProfileSummary::find()
        .filter(Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn find_by_login(db: &DatabaseConnection, login: &str) -> Result<Option<Model>> {
    ProfileSummary::find()
        .filter(Column::Login.eq(login))
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// All profiles ordered by login.
pub async fn list(db: &DatabaseConnection) -> Result<Vec<Model>> {
    ProfileSummary::find()
        .order_by_asc(Column::Login)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn count(db: &DatabaseConnection) -> Result<u64> {
    ProfileSummary::find()
        .count(db)
        .await
        .map_err(RepositoryError::from)
}

/// Insert or update a profile keyed by `external_id`.
///
/// On update the existing primary key and `created_at` are kept; every
/// other set field overwrites the stored value.
pub async fn upsert(db: &DatabaseConnection, model: ActiveModel) -> Result<UpsertOutcome> {
    let external_id = required_active_value("external_id", &model.external_id)?;

    match find_by_external_id(db, external_id).await? {
        Some(existing) => {
            let mut update_model = model;
            update_model.id = ActiveValue::Unchanged(existing.id);
            update_model.created_at = ActiveValue::NotSet;
            let updated = update_model.update(db).await?;
            Ok(UpsertOutcome::Updated(updated))
        }
        None => {
            let mut insert_model = model;
            if insert_model.id.is_not_set() {
                insert_model.id = Set(Uuid::new_v4());
            }
            let inserted = insert_model.insert(db).await?;
            Ok(UpsertOutcome::Created(inserted))
        }
    }
}

fn required_active_value<T: Clone + Into<sea_orm::Value>>(
    field: &str,
    value: &ActiveValue<T>,
) -> Result<T> {
    match value {
        ActiveValue::Set(value) | ActiveValue::Unchanged(value) => Ok(value.clone()),
        ActiveValue::NotSet => Err(RepositoryError::invalid_input(format!(
            "Missing required field: {field}"
        ))),
    }
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use crate::connect_and_migrate;
    use serde_json::json;

    fn detail(id: i64, login: &str, pool_month: &str, tracks: &[i64]) -> UserDetail {
        let cursus_users: Vec<serde_json::Value> = tracks
            .iter()
            .map(|t| json!({"cursus_id": t, "blackholed_at": null}))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "login": login,
            "pool_month": pool_month,
            "pool_year": "2024",
            "cursus_users": cursus_users,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let first_seen = Utc::now();

        let created = upsert(&db, active_model_from_detail(&detail(7, "jdoe", "march", &[9]), first_seen))
            .await
            .unwrap();
        assert!(created.was_created());

        let later = first_seen + chrono::Duration::days(30);
        let updated = upsert(
            &db,
            active_model_from_detail(&detail(7, "jdoe", "march", &[9, 21]), later),
        )
        .await
        .unwrap();
        assert!(!updated.was_created());

        let row = updated.into_model();
        assert_eq!(row.id, created.model().id);
        assert_eq!(row.track_id_list(), vec![9, 21]);
        assert_eq!(row.created_at, created.model().created_at);
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_rename_is_tracked_by_external_id() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        upsert(&db, active_model_from_detail(&detail(8, "old", "july", &[]), now))
            .await
            .unwrap();
        upsert(&db, active_model_from_detail(&detail(8, "new", "july", &[]), now))
            .await
            .unwrap();

        assert!(find_by_login(&db, "old").await.unwrap().is_none());
        let renamed = find_by_login(&db, "new").await.unwrap().unwrap();
        assert_eq!(renamed.external_id, 8);
        assert_eq!(list(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_missing_external_id() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let mut model = active_model_from_detail(&detail(9, "x", "may", &[]), Utc::now());
        model.external_id = ActiveValue::NotSet;

        let err = upsert(&db, model).await.unwrap_err();
        match err {
            RepositoryError::InvalidInput { message } => {
                assert!(message.contains("external_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
