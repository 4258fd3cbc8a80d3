//! Progress events for sync runs and the jobs built on top of them.

/// Progress events emitted while listing, hydrating and persisting profiles.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to list the members of a track.
    ListingTrack {
        track_id: i64,
        /// Whether the pool window applies to this track.
        pool_window: bool,
    },

    /// Fetched one page of a list endpoint.
    FetchedPage {
        endpoint: String,
        /// Page number (1-indexed).
        page: u32,
        count: usize,
        /// Running total of records fetched from this endpoint.
        total_so_far: usize,
    },

    /// Finished listing a track.
    ListingComplete {
        track_id: i64,
        total: usize,
        /// Members left after the pool window.
        kept: usize,
    },

    /// De-duplicated logins ready for hydration.
    CandidatesReady { count: usize },

    /// Starting to fetch detail records.
    HydratingDetails {
        count: usize,
        stagger_ms: u64,
    },

    /// One detail record arrived.
    DetailFetched { login: String, attempts: u32 },

    /// A profile summary was written.
    ProfileUpserted { login: String, created: bool },

    /// The snapshot batch was flushed.
    SnapshotsPersisted { inserted: u64, skipped: u64 },

    /// A retryable operation failed and will be attempted again.
    Retrying {
        label: String,
        attempt: u32,
        retry_after_ms: u64,
        error: String,
    },

    /// Non-fatal problem.
    Warning { message: String },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
