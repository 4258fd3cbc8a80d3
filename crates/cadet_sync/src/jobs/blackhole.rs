//! Upcoming blackhole deadlines, summarized from the latest snapshots.
//!
//! The webhook post carries the counts as embed fields and the full list as a
//! `blackhole_{date}.csv` attachment, ordered by deadline.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use super::error::JobError;
use crate::intra::UserDetail;
use crate::notify::{Channel, Notification, Notifier};
use crate::repository::snapshot;
use crate::settings::RedistributionSettings;

/// Deadlines more than this many days in the past are ignored.
const STALE_AFTER_DAYS: i64 = 1;

const SECONDS_PER_DAY: i64 = 86_400;

/// Header row of the CSV attachment, in field order of [`BlackholeEntry`].
const CSV_COLUMNS: [&str; 9] = [
    "login",
    "level",
    "pool_month",
    "pool_year",
    "email",
    "first_name",
    "last_name",
    "blackholed_at",
    "days_left",
];

/// Whole days from `now` to `deadline`, rounded toward the past.
///
/// A deadline 12 hours ago is `-1`, one 36 hours ago is `-2`.
fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// One cadet in the CSV attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackholeEntry {
    pub login: String,
    pub level: Option<f64>,
    pub pool_month: Option<String>,
    pub pool_year: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub blackholed_at: DateTime<Utc>,
    pub days_left: i64,
}

impl BlackholeEntry {
    /// Entry for a cadet of `track` whose deadline is set and not stale.
    #[must_use]
    pub fn from_detail(detail: &UserDetail, track: i64, now: DateTime<Utc>) -> Option<Self> {
        let cursus = detail.cursus(track)?;
        let blackholed_at = cursus.blackholed_at?;
        let days_left = days_until(blackholed_at, now);
        if days_left < -STALE_AFTER_DAYS {
            return None;
        }
        Some(Self {
            login: detail.login.clone(),
            level: cursus.level,
            pool_month: detail.pool_month.clone(),
            pool_year: detail.pool_year.clone(),
            email: detail.email.clone(),
            first_name: detail.first_name.clone(),
            last_name: detail.last_name.clone(),
            blackholed_at,
            days_left,
        })
    }
}

/// Render entries as CSV. The header row is written even with no entries.
pub fn to_csv(entries: &[BlackholeEntry]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlackholeReport {
    /// Profiles with a deadline that is upcoming or just passed.
    pub tracked: usize,
    pub within_14_days: usize,
    /// Strictly more than 14 and at most 30 days away.
    pub within_14_to_30_days: usize,
    pub within_45_days: usize,
}

impl BlackholeReport {
    /// Count deadlines relative to `now`.
    #[must_use]
    pub fn from_deadlines(
        deadlines: impl IntoIterator<Item = DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_days(deadlines.into_iter().map(|d| days_until(d, now)))
    }

    fn from_days(days_left: impl IntoIterator<Item = i64>) -> Self {
        let mut report = Self::default();
        for days in days_left {
            if days < -STALE_AFTER_DAYS {
                continue;
            }
            report.tracked += 1;
            if days <= 14 {
                report.within_14_days += 1;
            } else if days <= 30 {
                report.within_14_to_30_days += 1;
            }
            if days <= 45 {
                report.within_45_days += 1;
            }
        }
        report
    }

    fn notification(&self, color: &str) -> Notification {
        Notification::embed(
            "Blackhole report",
            format!("{} cadets with an upcoming blackhole.", self.tracked),
        )
        .with_color(color)
        .with_field("Within 14 days", self.within_14_days, true)
        .with_field("In 14 to 30 days", self.within_14_to_30_days, true)
        .with_field("Within 45 days", self.within_45_days, true)
    }
}

/// Build the report from the newest snapshot of every primary-track profile
/// and post it, with the CSV attached, to the report webhook.
pub async fn run(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    settings: &RedistributionSettings,
    now: DateTime<Utc>,
) -> Result<BlackholeReport, JobError> {
    let channel = Channel::resolve(db, notifier, &settings.report_webhook).await?;
    let track = settings.primary_track_id;

    let latest = snapshot::latest_per_profile(db, Some(track)).await?;
    let mut entries: Vec<BlackholeEntry> = latest
        .iter()
        .filter_map(|(profile, snap)| {
            match serde_json::from_value::<UserDetail>(snap.payload.clone()) {
                Ok(detail) => BlackholeEntry::from_detail(&detail, track, now),
                Err(e) => {
                    tracing::warn!(login = %profile.login, error = %e, "unreadable snapshot skipped");
                    None
                }
            }
        })
        .collect();
    entries.sort_by_key(|e| e.blackholed_at);

    let report = BlackholeReport::from_days(entries.iter().map(|e| e.days_left));
    let filename = format!("blackhole_{}.csv", now.format("%Y-%m-%d"));
    let notification = report.notification(&settings.color).with_attachment(
        filename,
        "text/csv",
        to_csv(&entries)?,
    );

    channel.send(&notification).await?;
    tracing::info!(
        tracked = report.tracked,
        within_14 = report.within_14_days,
        within_45 = report.within_45_days,
        "blackhole report sent"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn buckets_by_days_remaining() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let deadlines = [-3, -1, 0, 10, 14, 20, 30, 40, 60]
            .into_iter()
            .map(|d| now + Duration::days(d));

        let report = BlackholeReport::from_deadlines(deadlines, now);
        assert_eq!(report.tracked, 8);
        assert_eq!(report.within_14_days, 4);
        assert_eq!(report.within_14_to_30_days, 2);
        assert_eq!(report.within_45_days, 7);
    }

    #[test]
    fn partial_days_round_toward_the_past() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(days_until(now - Duration::hours(36), now), -2);
        assert_eq!(days_until(now - Duration::hours(12), now), -1);
        assert_eq!(days_until(now + Duration::hours(12), now), 0);
        assert_eq!(days_until(now + Duration::hours(36), now), 1);

        let report = BlackholeReport::from_deadlines(
            [
                now - Duration::hours(36),
                now - Duration::hours(12),
                now + Duration::hours(12),
            ],
            now,
        );
        assert_eq!(report.tracked, 2);
        assert_eq!(report.within_14_days, 2);
    }

    fn detail(value: serde_json::Value) -> UserDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn entry_requires_a_current_deadline_on_the_track() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let user = detail(serde_json::json!({
            "id": 7,
            "login": "jdoe",
            "email": "jdoe@student.42.fr",
            "first_name": "John",
            "last_name": "Doe",
            "pool_month": "july",
            "pool_year": 2023,
            "cursus_users": [
                {"cursus_id": 9, "blackholed_at": "2024-03-01T00:00:00Z", "level": 8.1},
                {"cursus_id": 21, "blackholed_at": "2024-03-20T12:00:00Z", "level": 4.5}
            ]
        }));

        let entry = BlackholeEntry::from_detail(&user, 21, now).unwrap();
        assert_eq!(entry.login, "jdoe");
        assert_eq!(entry.level, Some(4.5));
        assert_eq!(entry.pool_year.as_deref(), Some("2023"));
        assert_eq!(entry.days_left, 5);

        assert_eq!(BlackholeEntry::from_detail(&user, 9, now), None);
        assert_eq!(BlackholeEntry::from_detail(&user, 1, now), None);
    }

    #[test]
    fn csv_has_header_and_one_row_per_entry() {
        let entries = vec![BlackholeEntry {
            login: "jdoe".to_string(),
            level: Some(4.5),
            pool_month: Some("july".to_string()),
            pool_year: Some("2023".to_string()),
            email: Some("jdoe@student.42.fr".to_string()),
            first_name: Some("John".to_string()),
            last_name: None,
            blackholed_at: Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap(),
            days_left: 5,
        }];

        let csv = String::from_utf8(to_csv(&entries).unwrap()).unwrap();
        assert_eq!(
            csv,
            "login,level,pool_month,pool_year,email,first_name,last_name,blackholed_at,days_left\n\
             jdoe,4.5,july,2023,jdoe@student.42.fr,John,,2024-03-20T12:00:00Z,5\n"
        );

        let empty = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(empty.lines().count(), 1);
    }
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod job_tests {
    use super::*;
    use crate::connect_and_migrate;
    use crate::notify::test_support::RecordingNotifier;
    use crate::repository::{profile, webhook};
    use chrono::{Duration, TimeZone};
    use serde_json::{Value, json};

    async fn store(db: &DatabaseConnection, id: i64, login: &str, deadline: Value, at: DateTime<Utc>) {
        let payload = json!({
            "id": id,
            "login": login,
            "email": format!("{login}@student.42.fr"),
            "first_name": login,
            "last_name": "Doe",
            "pool_month": "march",
            "pool_year": "2023",
            "cursus_users": [{"cursus_id": 21, "blackholed_at": deadline, "level": 4.2}]
        });
        let detail: UserDetail = serde_json::from_value(payload.clone()).unwrap();
        let owner = profile::upsert(db, profile::active_model_from_detail(&detail, at))
            .await
            .unwrap()
            .into_model();
        snapshot::insert_many(db, vec![snapshot::new_snapshot(owner.id, at, payload)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn report_uses_latest_snapshot_only() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        webhook::save(&db, "notifications", "https://hooks.example/n", "")
            .await
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let soon = (now + Duration::days(5)).to_rfc3339();
        let later = (now + Duration::days(40)).to_rfc3339();

        store(&db, 1, "alice", json!(soon), now - Duration::days(2)).await;
        store(&db, 1, "alice", json!(later), now - Duration::days(1)).await;
        store(&db, 2, "bob", Value::Null, now - Duration::days(1)).await;

        let notifier = RecordingNotifier::new();
        let report = run(&db, &notifier, &RedistributionSettings::default(), now)
            .await
            .unwrap();

        assert_eq!(report.tracked, 1);
        assert_eq!(report.within_14_days, 0);
        assert_eq!(report.within_45_days, 1);
        assert_eq!(notifier.headlines(), vec!["Blackhole report"]);

        let sent = notifier.sent();
        let attachments = &sent[0].1.attachments;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "blackhole_2024-03-15.csv");
        assert_eq!(attachments[0].content_type, "text/csv");
        let csv = String::from_utf8(attachments[0].data.clone()).unwrap();
        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            vec![
                "login,level,pool_month,pool_year,email,first_name,last_name,blackholed_at,days_left",
                "alice,4.2,march,2023,alice@student.42.fr,alice,Doe,2024-04-24T10:00:00Z,40",
            ]
        );
    }

    #[tokio::test]
    async fn csv_rows_are_sorted_by_deadline_without_stale_ones() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        webhook::save(&db, "notifications", "https://hooks.example/n", "")
            .await
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let taken = now - Duration::hours(1);

        store(&db, 1, "alice", json!((now + Duration::days(20)).to_rfc3339()), taken).await;
        store(&db, 2, "bob", json!((now + Duration::days(3)).to_rfc3339()), taken).await;
        store(&db, 3, "carol", json!((now - Duration::hours(36)).to_rfc3339()), taken).await;
        store(&db, 4, "dave", json!((now - Duration::hours(12)).to_rfc3339()), taken).await;

        let notifier = RecordingNotifier::new();
        let report = run(&db, &notifier, &RedistributionSettings::default(), now)
            .await
            .unwrap();
        assert_eq!(report.tracked, 3);
        assert_eq!(report.within_14_days, 2);
        assert_eq!(report.within_14_to_30_days, 1);

        let sent = notifier.sent();
        let data = sent[0].1.attachments[0].data.clone();
        let mut reader = csv::Reader::from_reader(data.as_slice());
        let rows: Vec<(String, i64)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[8].parse().unwrap())
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("dave".to_string(), -1),
                ("bob".to_string(), 3),
                ("alice".to_string(), 20),
            ]
        );
    }

    #[tokio::test]
    async fn missing_report_webhook_is_a_config_error() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let notifier = RecordingNotifier::new();
        let err = run(&db, &notifier, &RedistributionSettings::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Config(_)));
    }
}
