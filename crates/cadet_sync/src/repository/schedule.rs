use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::scheduled_job::{ActiveModel, Column, Entity as ScheduledJob, Model};

use super::errors::{RepositoryError, Result};

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Model>> {
    ScheduledJob::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn list_enabled(db: &DatabaseConnection) -> Result<Vec<Model>> {
    ScheduledJob::find()
        .filter(Column::Enabled.eq(true))
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn find_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<Model>> {
    ScheduledJob::find()
        .filter(Column::Name.eq(name))
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// Record that a job fired at `at`.
pub async fn mark_run(db: &DatabaseConnection, id: Uuid, at: DateTime<Utc>) -> Result<Model> {
    let job = ScheduledJob::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("scheduled job id={id}")))?;
    let mut model: ActiveModel = job.into();
    model.last_run_at = Set(Some(at.fixed_offset()));
    model.update(db).await.map_err(RepositoryError::from)
}

pub async fn set_enabled(db: &DatabaseConnection, name: &str, enabled: bool) -> Result<Model> {
    let job = find_by_name(db, name)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("scheduled job '{name}'")))?;
    let mut model: ActiveModel = job.into();
    model.enabled = Set(enabled);
    model.update(db).await.map_err(RepositoryError::from)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use crate::connect_and_migrate;

    #[tokio::test]
    async fn seeded_jobs_are_listed() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let jobs = list(&db).await.unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["redistribute-points", "sync-profiles"]);

        let redistribute = &jobs[0];
        assert_eq!(redistribute.cron, "0 42 7 * * Mon");
        assert_eq!(redistribute.kwargs["target"], 10);
        assert!(redistribute.enabled);
        assert!(redistribute.last_run_at.is_none());
    }

    #[tokio::test]
    async fn disable_and_mark_run() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        set_enabled(&db, "redistribute-points", false).await.unwrap();
        let enabled = list_enabled(&db).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "sync-profiles");

        let at = Utc::now();
        let marked = mark_run(&db, enabled[0].id, at).await.unwrap();
        assert_eq!(marked.last_run_at.map(|t| t.timestamp()), Some(at.timestamp()));

        assert!(matches!(
            set_enabled(&db, "missing", true).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
