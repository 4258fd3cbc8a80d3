use cadet_sync::Notifier;
use cadet_sync::notify::send_message;
use sea_orm::DatabaseConnection;

use super::shared::{CliResult, print_ok};

/// Post a plain message to a named webhook.
pub(crate) async fn handle_notify(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    webhook: &str,
    message: &str,
) -> CliResult {
    send_message(db, notifier, webhook, message).await?;
    print_ok(format!("message sent to '{webhook}'"));
    Ok(())
}
