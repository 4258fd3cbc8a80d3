//! ProfileSummary entity - one row per Intra identity, updated in place on
//! every sync.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Intra numeric user id.
    #[sea_orm(unique)]
    pub external_id: i64,

    #[sea_orm(unique)]
    pub login: String,

    /// Piscine month, lowercase English name (e.g. "march").
    pub pool_month: Option<String>,
    pub pool_year: Option<String>,

    /// Cursus ids the user is enrolled in (JSON array of integers).
    #[sea_orm(column_type = "Json")]
    pub track_ids: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::profile_snapshot::Entity")]
    Snapshots,
}

impl Related<super::profile_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Snapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Track ids decoded from the JSON column; malformed entries are skipped.
    #[must_use]
    pub fn track_id_list(&self) -> Vec<i64> {
        self.track_ids
            .as_array()
            .map(|ids| ids.iter().filter_map(serde_json::Value::as_i64).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn in_track(&self, track_id: i64) -> bool {
        self.track_id_list().contains(&track_id)
    }
}
