//! Correction point redistribution.
//!
//! Every non-staff member of the primary track holding more than `target`
//! points gives the excess to the campus pool, highest balance first.
//! Blackholed users are exempt. Each transfer is a deduction followed by a
//! pool credit; the two calls are not atomic.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use super::error::JobError;
use crate::intra::{BalanceError, Filters, IntraClient, ListedUser, UserHandle};
use crate::notify::{Channel, Notification, Notifier};
use crate::settings::RedistributionSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub login: String,
    /// Balance read just before the transfer.
    pub balance: i64,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedistributionReport {
    pub target: i64,
    pub dry_run: bool,
    pub transfers: Vec<Transfer>,
    /// Logins exempted because their blackhole deadline has passed.
    pub blackholed: Vec<String>,
    pub total_points: i64,
}

/// Users holding more than `target` points, highest balance first (ties by
/// login). Staff are never selected.
#[must_use]
pub fn select_candidates(users: Vec<ListedUser>, target: i64) -> Vec<ListedUser> {
    let mut selected: Vec<ListedUser> = users
        .into_iter()
        .filter(|u| !u.staff && u.correction_point > target)
        .collect();
    selected.sort_by(|a, b| {
        (Reverse(a.correction_point), &a.login).cmp(&(Reverse(b.correction_point), &b.login))
    });
    selected
}

pub struct RedistributionJob<'a> {
    client: &'a IntraClient,
    db: &'a DatabaseConnection,
    notifier: &'a dyn Notifier,
    settings: &'a RedistributionSettings,
    campus_id: i64,
}

impl<'a> RedistributionJob<'a> {
    #[must_use]
    pub fn new(
        client: &'a IntraClient,
        db: &'a DatabaseConnection,
        notifier: &'a dyn Notifier,
        settings: &'a RedistributionSettings,
        campus_id: i64,
    ) -> Self {
        Self {
            client,
            db,
            notifier,
            settings,
            campus_id,
        }
    }

    pub async fn run(&self, target: i64, dry_run: bool) -> Result<RedistributionReport, JobError> {
        self.run_at(target, dry_run, Utc::now()).await
    }

    /// Run with `now` as the blackhole reference time.
    pub async fn run_at(
        &self,
        target: i64,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<RedistributionReport, JobError> {
        if target < 0 {
            return Err(BalanceError { requested: target }.into());
        }
        let channel =
            Channel::resolve(self.db, self.notifier, self.settings.webhook_for(dry_run)).await?;

        let track = self.settings.primary_track_id;
        let users = self
            .client
            .cursus_users(track, &Filters::new().campus(self.campus_id), None)
            .await?;
        let candidates = select_candidates(users, target);
        tracing::info!(
            target,
            dry_run,
            candidates = candidates.len(),
            "starting redistribution"
        );

        channel
            .send_logged(&self.announcement(
                "The purge has begun",
                format!("The purge has begun. Evaluation points exceeding {target} will be confiscated."),
                &self.settings.start_image_url,
            ))
            .await;

        let mut report = RedistributionReport {
            target,
            dry_run,
            transfers: Vec::new(),
            blackholed: Vec::new(),
            total_points: 0,
        };

        for candidate in candidates {
            let mut user = UserHandle::load(self.client, &candidate.login).await?;
            if user.is_blackholed(track, now)? {
                tracing::debug!(login = %candidate.login, "blackholed, exempt");
                report.blackholed.push(candidate.login);
                continue;
            }

            let balance = user.correction_point();
            let diff = balance - target;
            if diff <= 0 {
                continue;
            }

            if !dry_run {
                user.transfer_excess(target, self.settings.pool_id, false).await?;
            }
            tracing::info!(login = %candidate.login, points = diff, dry_run, "points pooled");

            channel
                .send_logged(&self.announcement(
                    "The purge is ongoing...",
                    format!("{} has given {diff} points to the pool.", candidate.login),
                    "",
                ))
                .await;
            report.total_points += diff;
            report.transfers.push(Transfer {
                login: candidate.login,
                balance,
                points: diff,
            });
        }

        channel
            .send_logged(&self.announcement(
                "The purge has ended",
                format!(
                    "The pool has been filled with {} points.\nThank you for your kind cooperation.\nSee you soon!",
                    report.total_points
                ),
                &self.settings.end_image_url,
            ))
            .await;

        tracing::info!(
            total_points = report.total_points,
            users = report.transfers.len(),
            "redistribution complete"
        );
        Ok(report)
    }

    /// A blank `image_url` means no image.
    fn announcement(&self, title: &str, description: String, image_url: &str) -> Notification {
        let notification =
            Notification::embed(title, description).with_color(self.settings.color.as_str());
        if image_url.trim().is_empty() {
            notification
        } else {
            notification.with_image(image_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listed(login: &str, points: i64, staff: bool) -> ListedUser {
        serde_json::from_value(json!({
            "id": 1, "login": login, "correction_point": points, "staff?": staff
        }))
        .unwrap()
    }

    #[test]
    fn candidates_above_target_highest_first() {
        let users = vec![
            listed("a", 5, false),
            listed("b", 25, false),
            listed("c", 10, false),
            listed("d", 30, false),
        ];
        let selected: Vec<(String, i64)> = select_candidates(users, 10)
            .into_iter()
            .map(|u| (u.login, u.correction_point))
            .collect();
        assert_eq!(selected, vec![("d".to_string(), 30), ("b".to_string(), 25)]);
    }

    #[test]
    fn staff_are_never_selected_and_ties_order_by_login() {
        let users = vec![
            listed("zed", 20, false),
            listed("boss", 99, true),
            listed("amy", 20, false),
        ];
        let logins: Vec<String> = select_candidates(users, 10)
            .into_iter()
            .map(|u| u.login)
            .collect();
        assert_eq!(logins, vec!["amy", "zed"]);
    }
}
