//! Persistence operations for profiles, snapshots, webhook targets and
//! scheduled jobs.
//!
//! Every write is its own statement or short transaction; nothing here wraps
//! a whole sync run.

mod errors;
pub mod profile;
pub mod schedule;
pub mod snapshot;
pub mod webhook;

pub use errors::{RepositoryError, Result};
pub use profile::UpsertOutcome;
pub use snapshot::InsertOutcome;
