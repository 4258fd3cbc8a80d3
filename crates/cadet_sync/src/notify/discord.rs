//! Discord-compatible incoming webhook delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Notification, Notifier, NotifyError};
use crate::http::{FormPart, HttpMethod, HttpRequest, HttpTransport};

/// Posts notifications as Discord webhook payloads over an [`HttpTransport`].
#[derive(Clone)]
pub struct WebhookNotifier {
    transport: Arc<dyn HttpTransport>,
}

impl WebhookNotifier {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

/// Parse `03b2f8` or `#03b2f8` into an embed color.
fn parse_color(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex.trim().trim_start_matches('#'), 16).ok()
}

/// JSON body for a notification.
#[must_use]
pub fn payload(notification: &Notification) -> Value {
    let mut body = json!({ "username": notification.username });

    if let Some(content) = &notification.content {
        body["content"] = json!(content);
    }

    let has_embed = notification.title.is_some()
        || notification.description.is_some()
        || notification.image_url.is_some()
        || !notification.fields.is_empty();
    if has_embed {
        let mut embed = json!({});
        if let Some(title) = &notification.title {
            embed["title"] = json!(title);
        }
        if let Some(description) = &notification.description {
            embed["description"] = json!(description);
        }
        if let Some(color) = notification.color.as_deref().and_then(parse_color) {
            embed["color"] = json!(color);
        }
        if let Some(url) = &notification.image_url {
            embed["image"] = json!({ "url": url });
        }
        if !notification.fields.is_empty() {
            embed["fields"] = notification
                .fields
                .iter()
                .map(|f| json!({"name": f.name, "value": f.value, "inline": f.inline}))
                .collect();
        }
        body["embeds"] = json!([embed]);
    }

    body
}

/// Request for a notification. Attachments switch the body to multipart,
/// with the JSON payload in `payload_json` and files as `files[i]`.
fn request(url: &str, notification: &Notification) -> HttpRequest {
    let request = HttpRequest::new(HttpMethod::Post, url);
    if notification.attachments.is_empty() {
        return request.json(&payload(notification));
    }

    let mut parts = vec![FormPart::text(
        "payload_json",
        "application/json",
        payload(notification).to_string(),
    )];
    parts.extend(notification.attachments.iter().enumerate().map(|(i, file)| {
        FormPart::file(
            format!("files[{i}]"),
            file.filename.clone(),
            &file.content_type,
            file.data.clone(),
        )
    }));
    request.multipart(parts)
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, url: &str, notification: &Notification) -> Result<(), NotifyError> {
        let request = request(url, notification);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "webhook rejected notification");
            return Err(NotifyError::Rejected {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    #[test]
    fn plain_message_has_no_embed() {
        let body = payload(&Notification::message("hello"));
        assert_eq!(body, json!({"username": "gateway", "content": "hello"}));
    }

    #[test]
    fn embed_carries_color_image_and_fields() {
        let notification = Notification::embed("The purge has begun", "target 10")
            .with_color("03b2f8")
            .with_image("https://img.example/purge.gif")
            .with_field("Within 14 days", 3, true);

        let body = payload(&notification);
        let embed = &body["embeds"][0];
        assert_eq!(body["username"], "Announcement");
        assert_eq!(embed["title"], "The purge has begun");
        assert_eq!(embed["color"], 0x03b2f8);
        assert_eq!(embed["image"]["url"], "https://img.example/purge.gif");
        assert_eq!(embed["fields"][0]["value"], "3");
    }

    #[test]
    fn invalid_color_is_omitted() {
        let body = payload(&Notification::embed("t", "d").with_color("#zzz"));
        assert!(body["embeds"][0].get("color").is_none());
        assert_eq!(parse_color("#ff0000"), Some(0xff0000));
    }

    #[tokio::test]
    async fn posts_json_and_reports_rejection() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, "https://hooks.example/ok", 204, json!({}));
        transport.push_json(
            HttpMethod::Post,
            "https://hooks.example/bad",
            400,
            json!({"message": "Invalid Webhook Token"}),
        );
        let notifier = WebhookNotifier::new(Arc::new(transport.clone()));

        notifier
            .send("https://hooks.example/ok", &Notification::message("ok"))
            .await
            .unwrap();
        let err = notifier
            .send("https://hooks.example/bad", &Notification::message("no"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 400, .. }));

        let sent = transport.requests();
        assert_eq!(sent[0].header_value("content-type"), Some("application/json"));
        assert!(sent[0].parts.is_empty());
    }

    #[tokio::test]
    async fn attachments_are_uploaded_as_multipart() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, "https://hooks.example/r", 200, json!({}));
        let notifier = WebhookNotifier::new(Arc::new(transport.clone()));
        let notification = Notification::embed("Blackhole report", "2 cadets")
            .with_attachment("blackhole_2024-03-15.csv", "text/csv", b"login\njdoe\n".to_vec());

        notifier
            .send("https://hooks.example/r", &notification)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.is_empty());
        let parts = &sent[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "payload_json");
        let body: Value = serde_json::from_slice(&parts[0].data).unwrap();
        assert_eq!(body["embeds"][0]["title"], "Blackhole report");
        assert_eq!(parts[1].name, "files[0]");
        assert_eq!(parts[1].filename.as_deref(), Some("blackhole_2024-03-15.csv"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/csv"));
        assert_eq!(parts[1].data, b"login\njdoe\n".to_vec());
    }
}
