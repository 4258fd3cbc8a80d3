//! Named webhook notifications.
//!
//! Targets are rows of `webhook_targets`, looked up by name when a job runs.
//! Delivery failures are returned to the caller and never retried here.

mod discord;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use thiserror::Error;

use crate::repository::{RepositoryError, webhook};

pub use discord::{WebhookNotifier, payload};

/// Username of plain one-off messages.
pub const MESSAGE_USERNAME: &str = "gateway";

/// Username of job announcements.
pub const ANNOUNCEMENT_USERNAME: &str = "Announcement";

/// A required webhook target is not configured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no webhook target named '{name}' is configured")]
    MissingWebhook { name: String },

    #[error("failed to look up webhook '{name}': {source}")]
    Lookup {
        name: String,
        #[source]
        source: RepositoryError,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A file uploaded alongside a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message posted to a webhook: plain content, an embed, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub username: String,
    pub content: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Embed color as hex, with or without a leading `#`.
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub fields: Vec<EmbedField>,
    pub attachments: Vec<Attachment>,
}

impl Notification {
    /// Plain text message.
    #[must_use]
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            username: MESSAGE_USERNAME.to_string(),
            content: Some(content.into()),
            title: None,
            description: None,
            color: None,
            image_url: None,
            fields: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Embed with a title and description.
    #[must_use]
    pub fn embed(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            username: ANNOUNCEMENT_USERNAME.to_string(),
            content: None,
            title: Some(title.into()),
            description: Some(description.into()),
            color: None,
            image_url: None,
            fields: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, hex: impl Into<String>) -> Self {
        self.color = Some(hex.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_attachment(
        mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.attachments.push(Attachment {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl ToString, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.to_string(),
            inline,
        });
        self
    }
}

/// Delivers notifications to webhook URLs.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, url: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// URL of the webhook target called `name`.
pub async fn resolve_webhook(db: &DatabaseConnection, name: &str) -> Result<String, ConfigError> {
    match webhook::find_by_name(db, name).await {
        Ok(Some(target)) => Ok(target.url),
        Ok(None) => Err(ConfigError::MissingWebhook {
            name: name.to_string(),
        }),
        Err(source) => Err(ConfigError::Lookup {
            name: name.to_string(),
            source,
        }),
    }
}

/// A resolved webhook target bound to a notifier.
pub struct Channel<'a> {
    notifier: &'a dyn Notifier,
    name: String,
    url: String,
}

impl<'a> Channel<'a> {
    pub async fn resolve(
        db: &DatabaseConnection,
        notifier: &'a dyn Notifier,
        name: &str,
    ) -> Result<Self, ConfigError> {
        let url = resolve_webhook(db, name).await?;
        Ok(Self {
            notifier,
            name: name.to_string(),
            url,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.notifier.send(&self.url, notification).await
    }

    /// Send, logging instead of failing. For progress broadcasts whose loss
    /// must not abort the job.
    pub async fn send_logged(&self, notification: &Notification) {
        if let Err(e) = self.send(notification).await {
            tracing::warn!(webhook = %self.name, error = %e, "notification not delivered");
        }
    }
}

/// Post a plain message to the webhook called `name`.
pub async fn send_message(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    name: &str,
    message: &str,
) -> Result<(), NotifyError> {
    let channel = Channel::resolve(db, notifier, name).await?;
    channel.send(&Notification::message(message)).await?;
    tracing::info!(webhook = name, "message sent");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Records every notification; URLs in `failing` answer 500.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        sent: Mutex<Vec<(String, Notification)>>,
        failing: Vec<String>,
    }

    impl RecordingNotifier {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_for(url: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing: vec![url.to_string()],
            }
        }

        pub(crate) fn sent(&self) -> Vec<(String, Notification)> {
            self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
        }

        /// Titles (or content for plain messages) in send order.
        pub(crate) fn headlines(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .map(|(_, n)| n.title.or(n.content).unwrap_or_default())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, url: &str, notification: &Notification) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push((url.to_string(), notification.clone()));
            if self.failing.iter().any(|f| f == url) {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::test_support::RecordingNotifier;
    use super::*;
    use crate::connect_and_migrate;

    #[tokio::test]
    async fn send_message_uses_gateway_username() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        webhook::save(&db, "notifications", "https://hooks.example/n", "")
            .await
            .unwrap();
        let notifier = RecordingNotifier::new();

        send_message(&db, &notifier, "notifications", "hello").await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://hooks.example/n");
        assert_eq!(sent[0].1.username, "gateway");
        assert_eq!(sent[0].1.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unknown_target_is_a_config_error() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let notifier = RecordingNotifier::new();

        let err = send_message(&db, &notifier, "nowhere", "hello")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotifyError::Config(ConfigError::MissingWebhook { ref name }) if name == "nowhere"
        ));
        assert!(notifier.sent().is_empty());
    }
}
