//! Profile synchronization.
//!
//! - [`engine`] - [`SyncPipeline`]: list, window, hydrate, upsert, snapshot
//! - [`hydrate`] - [`DetailFetcher`]: staggered per-login fan-out with retries
//! - [`window`] - pool cohort window
//! - [`progress`] - [`SyncProgress`] events and the [`emit`] helper
//!
//! # Example
//!
//! ```ignore
//! use cadet_sync::{IntraClient, Settings, connect_and_migrate, sync::SyncPipeline};
//!
//! let settings = Settings::default();
//! let client = IntraClient::new(&settings.intra)?;
//! let db = connect_and_migrate("sqlite://cadet-sync.db?mode=rwc").await?;
//! let result = SyncPipeline::new(&client, &db, &settings).run().await?;
//! println!("{}", result.summary());
//! ```

pub mod engine;
pub mod hydrate;
mod progress;
mod types;
pub mod window;

pub use engine::SyncPipeline;
pub use hydrate::{DetailFetcher, FetchError, Fetched};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{SyncError, SyncResult};
pub use window::in_pool_window;
