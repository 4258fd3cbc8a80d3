//! Derived cadet status, read from the newest snapshot of a profile.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::Value;

use crate::intra::UserDetail;
use crate::repository::{Result, snapshot};

/// Slug of the main curriculum.
pub const MAIN_CURSUS_SLUG: &str = "42cursus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enrollment {
    NoCursus,
    Cadet,
    Pisciner,
}

impl Enrollment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Enrollment::NoCursus => "no-cursus",
            Enrollment::Cadet => "cadet",
            Enrollment::Pisciner => "pisciner",
        }
    }
}

impl fmt::Display for Enrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CadetStatus {
    pub login: String,
    /// Capture time of the snapshot the status was derived from.
    pub updated: DateTime<Utc>,
    pub blackholed: bool,
    pub enrollment: Enrollment,
    pub correction_point: i64,
}

/// Derive a status from a raw user record.
///
/// Payloads that do not parse as a user record are treated as having no
/// enrollment.
#[must_use]
pub fn resolve_status(
    payload: &Value,
    captured_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CadetStatus {
    let detail: Option<UserDetail> = serde_json::from_value(payload.clone()).ok();
    let login = detail
        .as_ref()
        .map(|d| d.login.clone())
        .or_else(|| payload["login"].as_str().map(str::to_string))
        .unwrap_or_default();

    let Some(detail) = detail else {
        return CadetStatus {
            login,
            updated: captured_at,
            blackholed: false,
            enrollment: Enrollment::NoCursus,
            correction_point: 0,
        };
    };

    let main = detail
        .cursus_users
        .iter()
        .find(|c| c.slug() == Some(MAIN_CURSUS_SLUG));
    let enrollment = if detail.cursus_users.is_empty() {
        Enrollment::NoCursus
    } else if main.is_some() {
        Enrollment::Cadet
    } else {
        Enrollment::Pisciner
    };
    let blackholed = main
        .and_then(|c| c.blackholed_at)
        .is_some_and(|deadline| deadline < now);

    CadetStatus {
        login,
        updated: captured_at,
        blackholed,
        enrollment,
        correction_point: detail.correction_point,
    }
}

/// Status of `login` from its newest snapshot, or `None` if it was never
/// synced.
pub async fn latest_status(
    db: &DatabaseConnection,
    login: &str,
    now: DateTime<Utc>,
) -> Result<Option<CadetStatus>> {
    let Some(latest) = snapshot::latest_for_login(db, login).await? else {
        return Ok(None);
    };
    Ok(Some(resolve_status(
        &latest.payload,
        latest.captured_at.with_timezone(&Utc),
        now,
    )))
}


#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod db_tests {
    use super::*;
    use crate::connect_and_migrate;
    use crate::repository::profile;
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn newest_snapshot_wins_regardless_of_insert_order() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 3, 3, 10, 0, 0).unwrap();

        let detail: UserDetail =
            serde_json::from_value(json!({"id": 5, "login": "jdoe"})).unwrap();
        let owner = profile::upsert(&db, profile::active_model_from_detail(&detail, t1))
            .await
            .unwrap()
            .into_model();

        let payload = |points: i64| json!({"id": 5, "login": "jdoe", "correction_point": points});
        snapshot::insert_many(
            &db,
            vec![
                snapshot::new_snapshot(owner.id, t2, payload(2)),
                snapshot::new_snapshot(owner.id, t3, payload(3)),
                snapshot::new_snapshot(owner.id, t1, payload(1)),
            ],
        )
        .await
        .unwrap();

        let status = latest_status(&db, "jdoe", t3).await.unwrap().unwrap();
        assert_eq!(status.updated, t3);
        assert_eq!(status.correction_point, 3);

        assert!(latest_status(&db, "nobody", t3).await.unwrap().is_none());
    }
}
