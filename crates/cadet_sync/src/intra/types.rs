//! Intra API payload types.
//!
//! Only the fields the crate reads are modelled; everything else in a user
//! record is preserved verbatim in snapshot payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A user as returned by list endpoints (`/users`, `/cursus/{id}/users`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedUser {
    pub id: i64,
    pub login: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pool_month: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pool_year: Option<String>,
    #[serde(default)]
    pub correction_point: i64,
    #[serde(rename = "staff?", default)]
    pub staff: bool,
}

/// Full user record from `GET /users/{login}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pool_month: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pool_year: Option<String>,
    #[serde(default)]
    pub correction_point: i64,
    #[serde(rename = "staff?", default)]
    pub staff: bool,
    #[serde(default)]
    pub cursus_users: Vec<CursusUser>,
}

impl UserDetail {
    /// Enrollment in a given cursus (track), if any.
    #[must_use]
    pub fn cursus(&self, cursus_id: i64) -> Option<&CursusUser> {
        self.cursus_users.iter().find(|c| c.cursus_id == cursus_id)
    }

    /// Ids of every cursus the user is enrolled in, deduplicated and sorted.
    #[must_use]
    pub fn track_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.cursus_users.iter().map(|c| c.cursus_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// One enrollment entry of a user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursusUser {
    pub cursus_id: i64,
    #[serde(default)]
    pub blackholed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub cursus: Option<CursusRef>,
}

impl CursusUser {
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.cursus.as_ref().map(|c| c.slug.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursusRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// A project of a cursus (`/cursus/{id}/projects`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A shared point pool (`/pools/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: i64,
    #[serde(default)]
    pub current_points: i64,
    #[serde(default)]
    pub max_points: i64,
    #[serde(default)]
    pub cursus_id: Option<i64>,
    #[serde(default)]
    pub campus_id: Option<i64>,
}

/// Ordered `filter[...]` query parameters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, String)>);

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `filter[{field}]={value}`.
    #[must_use]
    pub fn field(mut self, field: &str, value: impl ToString) -> Self {
        self.0.push((format!("filter[{field}]"), value.to_string()));
        self
    }

    /// Shorthand for `filter[primary_campus_id]`.
    #[must_use]
    pub fn campus(self, campus_id: i64) -> Self {
        self.field("primary_campus_id", campus_id)
    }

    #[must_use]
    pub fn as_params(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Intra serializes some numeric-looking fields as strings and others as
/// numbers depending on the endpoint.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}
