//! Configuration file support for cadet-sync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `CADET_SYNC_`, nested keys joined
//!    with `__`, e.g. `CADET_SYNC_INTRA__CLIENT_ID`)
//! 3. Config file (`./cadet-sync.toml`, then `~/.config/cadet-sync/config.toml`)
//! 4. Built-in defaults
//!
//! `FORTY_TWO_CLIENT_ID` and `FORTY_TWO_CLIENT_SECRET` are read as a fallback
//! for the Intra credentials.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite:///var/lib/cadet-sync/cadet-sync.db?mode=rwc"
//!
//! [intra]
//! client_id = "u-s4t2ud-..."
//! client_secret = "s-s4t2ud-..."
//! campus_id = 33
//! rps = 2
//!
//! [sync]
//! track_ids = [9, 3, 21]
//! pool_track_ids = [9, 3]
//! stagger_ms = 500
//!
//! [redistribution]
//! target = 10
//! pool_id = 73
//! start_image_url = "https://img.example/purge-start.jpg"
//! end_image_url = ""
//!
//! [scheduler]
//! sync_webhook = "notifications"
//! retry_delay_secs = 60
//! max_retries = 3
//! ```

use std::path::PathBuf;

use cadet_sync::settings::{
    IntraSettings, RedistributionSettings, SchedulerSettings, Settings, SyncSettings,
};
use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

const APP_NAME: &str = "cadet-sync";
const ENV_PREFIX: &str = "CADET_SYNC";
const LEGACY_CLIENT_ID: &str = "FORTY_TWO_CLIENT_ID";
const LEGACY_CLIENT_SECRET: &str = "FORTY_TWO_CLIENT_SECRET";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub intra: IntraSettings,
    pub sync: SyncSettings,
    pub redistribution: RedistributionSettings,
    pub scheduler: SchedulerSettings,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Supports `sqlite://` and `postgres://` URLs. Defaults to a SQLite file
    /// in the state directory.
    pub url: Option<String>,
}

impl Config {
    /// Load configuration from files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("cadet-sync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./cadet-sync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(environment());

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_legacy_credentials(
            std::env::var(LEGACY_CLIENT_ID).ok(),
            std::env::var(LEGACY_CLIENT_SECRET).ok(),
        );
        Ok(config)
    }

    /// Fill missing credentials from the legacy variables.
    fn apply_legacy_credentials(&mut self, client_id: Option<String>, secret: Option<String>) {
        if self.intra.client_id.is_none() {
            self.intra.client_id = client_id;
        }
        if self.intra.client_secret.is_none() {
            self.intra.client_secret = secret;
        }
    }

    /// Library settings view of this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            intra: self.intra.clone(),
            sync: self.sync.clone(),
            redistribution: self.redistribution.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    /// The configured database URL, or a SQLite file in the state directory.
    ///
    /// `mode=rwc` creates the file on first use.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("cadet-sync.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// `$XDG_STATE_HOME/cadet-sync` on Linux, the data directory elsewhere.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("sync.track_ids")
        .with_list_parse_key("sync.pool_track_ids")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert_eq!(config.intra.campus_id, 33);
        assert_eq!(config.redistribution.target, 10);
        assert_eq!(config.scheduler.max_retries, 3);
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [database]
            url = "sqlite:///tmp/test.db"

            [intra]
            client_id = "uid"
            client_secret = "secret"
            campus_id = 1
            rps = 4

            [sync]
            track_ids = [21]
            pool_track_ids = []
            stagger_ms = 0

            [redistribution]
            target = 8
            live_webhook = "live"

            [scheduler]
            retry_delay_secs = 5
        "#,
        );

        assert_eq!(
            config.database.url,
            Some("sqlite:///tmp/test.db".to_string())
        );
        let settings = config.settings();
        assert_eq!(settings.intra.client_id.as_deref(), Some("uid"));
        assert_eq!(settings.intra.campus_id, 1);
        assert_eq!(settings.intra.rps, 4);
        assert_eq!(settings.sync.track_ids, vec![21]);
        assert!(settings.sync.pool_track_ids.is_empty());
        assert_eq!(settings.redistribution.target, 8);
        assert_eq!(settings.redistribution.webhook_for(false), "live");
        assert_eq!(settings.redistribution.webhook_for(true), "testhook");
        assert_eq!(settings.scheduler.retry_delay_secs, 5);
        assert_eq!(settings.scheduler.max_retries, 3);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = from_toml(
            r#"
            [sync]
            stagger_ms = 100
        "#,
        );
        assert_eq!(config.sync.stagger_ms, 100);
        assert_eq!(config.sync.track_ids, vec![9, 3, 21, 74, 75, 69]);
        assert_eq!(config.intra.base_url, "https://api.intra.42.fr/v2");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config = from_toml(
            r#"
            [intra]
            campus_id = 12
            legacy_option = true
        "#,
        );
        assert_eq!(config.intra.campus_id, 12);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[intra\ncampus_id = ", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_legacy_credentials_only_fill_gaps() {
        let mut config = from_toml(
            r#"
            [intra]
            client_id = "configured"
        "#,
        );
        config.apply_legacy_credentials(Some("legacy-id".into()), Some("legacy-secret".into()));

        assert_eq!(config.intra.client_id.as_deref(), Some("configured"));
        assert_eq!(config.intra.client_secret.as_deref(), Some("legacy-secret"));
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let config = Config::default();
        if let Some(url) = config.database_url() {
            assert!(url.starts_with("sqlite://"));
            assert!(url.ends_with("cadet-sync.db?mode=rwc"));
        }
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres:///cadet_sync"
        "#,
        );
        assert_eq!(
            config.database_url(),
            Some("postgres:///cadet_sync".to_string())
        );
    }
}
