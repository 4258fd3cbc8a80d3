//! ProfileSnapshot entity - append-only history of full user records.
//!
//! For a given profile, the row with the greatest `captured_at` is the
//! authoritative source for derived fields.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub profile_id: Uuid,

    pub captured_at: DateTimeWithTimeZone,

    /// The user record exactly as returned by `GET /users/{login}`.
    #[sea_orm(column_type = "Json")]
    pub payload: serde_json::Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile_summary::Entity",
        from = "Column::ProfileId",
        to = "super::profile_summary::Column::Id",
        on_delete = "Cascade"
    )]
    Profile,
}

impl Related<super::profile_summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
