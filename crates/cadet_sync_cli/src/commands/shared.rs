//! Wiring shared by the commands: database, Intra client and notifier.

use std::sync::Arc;
use std::time::Duration;

use cadet_sync::{IntraClient, JobContext, ReqwestTransport, Settings, WebhookNotifier};
use console::style;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use super::OutputFormat;
use crate::config::Config;

pub(crate) type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open the database, applying pending migrations when supported.
pub(crate) async fn open_db(database_url: &str) -> CliResult<DatabaseConnection> {
    #[cfg(feature = "migrate")]
    let db = cadet_sync::connect_and_migrate(database_url).await?;
    #[cfg(not(feature = "migrate"))]
    let db = cadet_sync::connect(database_url).await?;
    Ok(db)
}

/// Everything a job needs, built once per invocation.
pub(crate) struct Runtime {
    pub(crate) db: DatabaseConnection,
    pub(crate) client: IntraClient,
    pub(crate) notifier: WebhookNotifier,
    pub(crate) settings: Settings,
}

impl Runtime {
    /// Fails before any network call when the Intra credentials are missing.
    pub(crate) async fn open(config: &Config, database_url: &str) -> CliResult<Self> {
        let settings = config.settings();
        let client = IntraClient::new(&settings.intra)?;
        let notifier = notifier(&settings)?;
        let db = open_db(database_url).await?;
        Ok(Self {
            db,
            client,
            notifier,
            settings,
        })
    }

    pub(crate) fn jobs(&self) -> JobContext<'_> {
        JobContext::new(&self.client, &self.db, &self.notifier, &self.settings)
    }
}

/// Webhook notifier over its own reqwest transport.
pub(crate) fn notifier(settings: &Settings) -> CliResult<WebhookNotifier> {
    let transport =
        ReqwestTransport::with_timeout(Duration::from_secs(settings.intra.timeout_secs))?;
    Ok(WebhookNotifier::new(Arc::new(transport)))
}

/// Render rows as a rounded table or pretty JSON.
pub(crate) fn print_rows<T: Tabled + Serialize>(rows: Vec<T>, format: OutputFormat) -> CliResult {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// One-line success summary.
pub(crate) fn print_ok(message: impl std::fmt::Display) {
    println!("{} {message}", style("✓").green());
}

/// One-line failure summary.
pub(crate) fn print_failed(message: impl std::fmt::Display) {
    println!("{} {message}", style("✗").red());
}
