//! Runtime settings, built once at startup and passed down by reference.

use std::time::Duration;

use serde::Deserialize;

use crate::intra::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, INTRA_DEFAULT_RPS};
use crate::oauth::{AuthError, ClientCredentials};

/// Root settings object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub intra: IntraSettings,
    pub sync: SyncSettings,
    pub redistribution: RedistributionSettings,
    pub scheduler: SchedulerSettings,
}

/// Intra API endpoint, credentials and pacing.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct IntraSettings {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub campus_id: i64,
    pub rps: u32,
    pub timeout_secs: u64,
    pub page_size: u32,
}

impl Default for IntraSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            campus_id: 33,
            rps: INTRA_DEFAULT_RPS,
            timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl std::fmt::Debug for IntraSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntraSettings")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("campus_id", &self.campus_id)
            .field("rps", &self.rps)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl IntraSettings {
    /// Application credentials, or a configuration error naming the first
    /// missing key.
    pub fn credentials(&self) -> Result<ClientCredentials, AuthError> {
        let client_id = non_empty(self.client_id.as_deref())
            .ok_or_else(|| AuthError::configuration("intra.client_id is not set"))?;
        let client_secret = non_empty(self.client_secret.as_deref())
            .ok_or_else(|| AuthError::configuration("intra.client_secret is not set"))?;
        Ok(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Which cohorts the profile sync looks at.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub track_ids: Vec<i64>,
    /// Tracks whose members are only kept inside the pool window.
    pub pool_track_ids: Vec<i64>,
    pub window_months: u32,
    /// Delay between two detail fetch launches.
    pub stagger_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            track_ids: vec![9, 3, 21, 74, 75, 69],
            pool_track_ids: vec![9, 3],
            window_months: 2,
            stagger_ms: 500,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    #[must_use]
    pub fn is_pool_track(&self, track_id: i64) -> bool {
        self.pool_track_ids.contains(&track_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedistributionSettings {
    pub primary_track_id: i64,
    pub pool_id: i64,
    pub target: i64,
    pub live_webhook: String,
    pub dry_run_webhook: String,
    pub report_webhook: String,
    /// Embed color, as a hex string without the leading `#`.
    pub color: String,
    /// Image on the opening announcement; empty for none.
    pub start_image_url: String,
    /// Image on the closing announcement; empty for none.
    pub end_image_url: String,
}

impl Default for RedistributionSettings {
    fn default() -> Self {
        Self {
            primary_track_id: 21,
            pool_id: 73,
            target: 10,
            live_webhook: "socialism".to_string(),
            dry_run_webhook: "testhook".to_string(),
            report_webhook: "notifications".to_string(),
            color: "03b2f8".to_string(),
            start_image_url: "https://firebasestorage.googleapis.com/v0/b/ft-bangkok-general.appspot.com/o/alexis-montero-aGT9ofWZ9NA-unsplash.jpg?alt=media".to_string(),
            end_image_url: "https://firebasestorage.googleapis.com/v0/b/ft-bangkok-general.appspot.com/o/tim-mossholder-8R-mXppeakM-unsplash.jpg?alt=media".to_string(),
        }
    }
}

impl RedistributionSettings {
    /// Webhook name for a live or dry run.
    #[must_use]
    pub fn webhook_for(&self, dry_run: bool) -> &str {
        if dry_run {
            &self.dry_run_webhook
        } else {
            &self.live_webhook
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub sync_webhook: String,
    pub retry_delay_secs: u64,
    pub max_retries: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sync_webhook: "notifications".to_string(),
            retry_delay_secs: 60,
            max_retries: 3,
        }
    }
}

impl SchedulerSettings {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_campus_setup() {
        let settings = Settings::default();
        assert_eq!(settings.intra.base_url, "https://api.intra.42.fr/v2");
        assert_eq!(settings.intra.campus_id, 33);
        assert_eq!(settings.intra.timeout_secs, 30);
        assert_eq!(settings.sync.track_ids, vec![9, 3, 21, 74, 75, 69]);
        assert!(settings.sync.is_pool_track(9));
        assert!(!settings.sync.is_pool_track(21));
        assert_eq!(settings.redistribution.webhook_for(true), "testhook");
        assert_eq!(settings.redistribution.webhook_for(false), "socialism");
        assert_eq!(settings.scheduler.max_retries, 3);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "intra": {"client_id": "uid", "client_secret": "secret"},
            "sync": {"window_months": 3}
        }))
        .unwrap();
        assert_eq!(settings.sync.window_months, 3);
        assert_eq!(settings.sync.stagger_ms, 500);
        assert_eq!(settings.intra.credentials().unwrap().client_id, "uid");
    }

    #[test]
    fn missing_or_blank_credentials_are_configuration_errors() {
        let mut intra = IntraSettings::default();
        assert!(matches!(
            intra.credentials(),
            Err(AuthError::Configuration(msg)) if msg.contains("client_id")
        ));

        intra.client_id = Some("uid".to_string());
        intra.client_secret = Some("   ".to_string());
        assert!(matches!(
            intra.credentials(),
            Err(AuthError::Configuration(msg)) if msg.contains("client_secret")
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let intra = IntraSettings {
            client_secret: Some("hunter2".to_string()),
            ..IntraSettings::default()
        };
        assert!(!format!("{intra:?}").contains("hunter2"));
    }
}
