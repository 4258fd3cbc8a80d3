use cadet_sync::CadetStatus;
use cadet_sync::latest_status;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tabled::Tabled;

use super::OutputFormat;
use super::shared::{CliResult, print_rows};

#[derive(Debug, Clone, Serialize, Tabled)]
struct StatusDisplay {
    #[tabled(rename = "Login")]
    login: String,
    #[tabled(rename = "Enrollment")]
    enrollment: String,
    #[tabled(rename = "Blackholed")]
    blackholed: bool,
    #[tabled(rename = "Correction points")]
    correction_point: i64,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<CadetStatus> for StatusDisplay {
    fn from(status: CadetStatus) -> Self {
        Self {
            login: status.login,
            enrollment: status.enrollment.to_string(),
            blackholed: status.blackholed,
            correction_point: status.correction_point,
            updated: status.updated.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

/// Show the status derived from the newest stored snapshot of `login`.
pub(crate) async fn handle_status(
    db: &DatabaseConnection,
    login: &str,
    output: OutputFormat,
) -> CliResult {
    match latest_status(db, login, Utc::now()).await? {
        Some(status) => print_rows(vec![StatusDisplay::from(status)], output),
        None => Err(format!("no snapshot stored for '{login}'; run `cadet-sync sync` first").into()),
    }
}
