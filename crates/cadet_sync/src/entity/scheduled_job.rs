//! ScheduledJob entity - what the scheduler runs, and when.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub name: String,

    /// Six or seven field cron expression, seconds first.
    pub cron: String,

    /// Task identifier, e.g. "sync-profiles".
    pub task: String,

    /// Keyword arguments handed to the task.
    #[sea_orm(column_type = "Json")]
    pub kwargs: serde_json::Value,

    #[sea_orm(default_value = true)]
    pub enabled: bool,

    pub last_run_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
