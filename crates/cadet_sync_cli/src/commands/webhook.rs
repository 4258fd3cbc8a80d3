//! Webhook target management (add, list, remove).

use cadet_sync::WebhookTargetModel;
use cadet_sync::repository::webhook;
use clap::Subcommand;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tabled::Tabled;

use super::OutputFormat;
use super::shared::{CliResult, print_ok, print_rows};

#[derive(Subcommand)]
pub enum WebhookAction {
    /// Add or replace a named webhook target
    Add {
        /// Name jobs refer to, e.g. "notifications"
        name: String,
        /// Webhook URL (http or https)
        url: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List configured webhook targets
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Remove a webhook target
    Remove { name: String },
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct WebhookDisplay {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&WebhookTargetModel> for WebhookDisplay {
    fn from(target: &WebhookTargetModel) -> Self {
        Self {
            name: target.name.clone(),
            url: redact_url(&target.url),
            description: target.description.clone(),
            created_at: target.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Keep scheme, host and the first path segment; webhook URLs embed their
/// secret token in the path.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "<invalid>".to_string();
    };
    let mut parts = rest.splitn(3, '/');
    let host = parts.next().unwrap_or_default();
    match (parts.next(), parts.next()) {
        (Some(first), Some(_)) => format!("{scheme}://{host}/{first}/…"),
        (Some(first), None) => format!("{scheme}://{host}/{first}"),
        _ => format!("{scheme}://{host}"),
    }
}

pub async fn handle_webhook(action: WebhookAction, db: &DatabaseConnection) -> CliResult {
    match action {
        WebhookAction::Add {
            name,
            url,
            description,
        } => {
            let saved = webhook::save(db, &name, &url, &description).await?;
            print_ok(format!("webhook '{}' saved", saved.name));
        }
        WebhookAction::List { output } => {
            let targets = webhook::list(db).await?;
            print_rows(targets.iter().map(WebhookDisplay::from).collect(), output)?;
        }
        WebhookAction::Remove { name } => {
            if webhook::remove(db, &name).await? == 0 {
                return Err(format!("no webhook named '{name}'").into());
            }
            print_ok(format!("webhook '{name}' removed"));
        }
    }
    Ok(())
}
