//! 42 Intra API client.
//!
//! - [`IntraClient`]: authenticated, paced, retrying egress point
//! - [`pagination`]: exhaustive listing over page-numbered endpoints
//! - [`UserHandle`]: user-scoped operations (correction points, blackhole,
//!   email) composed over a client
//! - [`ApiRateLimiter`]: governor-backed request pacing

mod client;
mod error;
pub mod pagination;
mod rate_limit;
mod types;
mod user;

pub use client::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, IntraClient, RequestBody};
pub use error::{HttpError, is_retryable};
pub use pagination::{PageStyle, list_all};
pub use rate_limit::{ApiRateLimiter, INTRA_DEFAULT_RPS};
pub use types::{CursusRef, CursusUser, Filters, ListedUser, Pool, Project, UserDetail};
pub use user::{BalanceError, REDISTRIBUTION_REASON, UserError, UserHandle};

#[cfg(test)]
pub(crate) use client::test_support;
