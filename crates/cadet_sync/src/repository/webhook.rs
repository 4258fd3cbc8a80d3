use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::webhook_target::{ActiveModel, Column, Entity as WebhookTarget, Model};

use super::errors::{RepositoryError, Result};

pub async fn find_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<Model>> {
    WebhookTarget::find()
        .filter(Column::Name.eq(name))
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Model>> {
    WebhookTarget::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Register a target, replacing the URL and description of an existing one
/// with the same name.
pub async fn save(
    db: &DatabaseConnection,
    name: &str,
    url: &str,
    description: &str,
) -> Result<Model> {
    if name.trim().is_empty() {
        return Err(RepositoryError::invalid_input("webhook name must not be empty"));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(RepositoryError::invalid_input(format!(
            "webhook url must be http(s): {url}"
        )));
    }

    match find_by_name(db, name).await? {
        Some(existing) => {
            let mut model: ActiveModel = existing.into();
            model.url = Set(url.to_string());
            model.description = Set(description.to_string());
            model.update(db).await.map_err(RepositoryError::from)
        }
        None => ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            url: Set(url.to_string()),
            description: Set(description.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(db)
        .await
        .map_err(RepositoryError::from),
    }
}

/// Delete a target by name; returns the number of rows removed (0 or 1).
pub async fn remove(db: &DatabaseConnection, name: &str) -> Result<u64> {
    let result = WebhookTarget::delete_many()
        .filter(Column::Name.eq(name))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
