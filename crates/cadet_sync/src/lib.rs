//! cadet_sync - mirror 42 Intra cadet profiles into a local database.
//!
//! The library lists the configured cursus tracks on the Intra API, fetches
//! every candidate's full profile and stores it as a timestamped snapshot.
//! On top of the stored data it runs the campus maintenance jobs: pooling
//! excess correction points, blackhole reporting and webhook notifications,
//! either on demand or from a cron [`scheduler`].
//!
//! # Features
//!
//! - `sqlite` (default) / `postgres` - database backends
//! - `migrate` (default) - enables [`connect_and_migrate`] and the
//!   [`migration`] module
//!
//! # Example
//!
//! ```ignore
//! use cadet_sync::{IntraClient, Settings, connect_and_migrate, sync::SyncPipeline};
//!
//! let settings = Settings::default();
//! let client = IntraClient::new(&settings.intra)?;
//! let db = connect_and_migrate("sqlite://cadet-sync.db?mode=rwc").await?;
//!
//! let result = SyncPipeline::new(&client, &db, &settings).run().await?;
//! println!("{}", result.summary());
//! ```

pub mod db;
pub mod entity;
pub mod http;
pub mod intra;
pub mod jobs;
pub mod notify;
pub mod oauth;
pub mod repository;
pub mod retry;
pub mod scheduler;
pub mod settings;
pub mod status;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::{connect, ensure_sqlite_parent_dir};
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use http::reqwest_transport::ReqwestTransport;
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
pub use intra::{HttpError, IntraClient, UserHandle};
pub use jobs::{JobContext, JobError};
pub use notify::{Notification, Notifier, WebhookNotifier};
pub use oauth::{AuthError, ClientCredentials, TokenCache};
pub use repository::RepositoryError;
pub use retry::RetryPolicy;
pub use scheduler::{JobDispatcher, Scheduler};
pub use settings::Settings;
pub use status::{CadetStatus, latest_status};
pub use sync::{SyncPipeline, SyncResult};
