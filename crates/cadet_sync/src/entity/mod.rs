//! SeaORM entity definitions for the cadet_sync database schema.

pub mod prelude;
pub mod profile_snapshot;
pub mod profile_summary;
pub mod scheduled_job;
pub mod webhook_target;
