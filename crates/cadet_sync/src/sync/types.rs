//! Sync outcome and error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::hydrate::FetchError;
use crate::intra::HttpError;
use crate::oauth::AuthError;
use crate::repository::RepositoryError;

/// Counters for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Capture time shared by every snapshot of the run.
    pub captured_at: DateTime<Utc>,
    /// Distinct logins kept after listing and windowing.
    pub candidates: usize,
    /// Detail records hydrated.
    pub fetched: usize,
    pub profiles_created: usize,
    pub profiles_updated: usize,
    pub snapshots_inserted: u64,
    /// Snapshots dropped on a `(profile, captured_at)` conflict.
    pub snapshots_skipped: u64,
}

impl SyncResult {
    #[must_use]
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            candidates: 0,
            fetched: 0,
            profiles_created: 0,
            profiles_updated: 0,
            snapshots_inserted: 0,
            snapshots_skipped: 0,
        }
    }

    /// One-line summary used by notifications and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} candidates, {} fetched, {} new / {} updated profiles, {} snapshots",
            self.candidates,
            self.fetched,
            self.profiles_created,
            self.profiles_updated,
            self.snapshots_inserted
        )
    }
}

/// Unrecoverable failure of a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Auth(#[source] AuthError),

    #[error("intra request failed: {0}")]
    Http(#[source] HttpError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected user record for {login}: {message}")]
    Decode { login: String, message: String },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<HttpError> for SyncError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Auth(auth) => SyncError::Auth(auth),
            other => SyncError::Http(other),
        }
    }
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        SyncError::Auth(err)
    }
}
