//! User-scoped operations on top of [`IntraClient`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::client::IntraClient;
use super::error::HttpError;
use super::types::UserDetail;

/// Reason attached to correction point changes made by the redistribution
/// job.
pub const REDISTRIBUTION_REASON: &str = "Evaluation point socialism.";

/// A correction point balance cannot go below zero.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("correction point balance cannot be negative (requested {requested})")]
pub struct BalanceError {
    pub requested: i64,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{login} is not enrolled in cursus {cursus_id}")]
    NotEnrolled { login: String, cursus_id: i64 },

    /// The deduction went through but the pool credit did not.
    #[error("{points} points deducted from {login} were not credited to pool {pool_id}: {source}")]
    PoolCredit {
        login: String,
        points: i64,
        pool_id: i64,
        #[source]
        source: HttpError,
    },
}

/// One user's detail record together with the client used to act on it.
///
/// Only user-scoped operations are exposed; listing and pool endpoints stay
/// on the client.
pub struct UserHandle<'a> {
    client: &'a IntraClient,
    detail: UserDetail,
}

impl<'a> UserHandle<'a> {
    /// Fetch `login` and wrap it.
    pub async fn load(client: &'a IntraClient, login: &str) -> Result<Self, HttpError> {
        let detail = client.user(login).await?;
        Ok(Self { client, detail })
    }

    #[must_use]
    pub fn from_detail(client: &'a IntraClient, detail: UserDetail) -> Self {
        Self { client, detail }
    }

    #[must_use]
    pub fn detail(&self) -> &UserDetail {
        &self.detail
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.detail.login
    }

    #[must_use]
    pub fn correction_point(&self) -> i64 {
        self.detail.correction_point
    }

    /// Re-read the detail record from the API.
    pub async fn refresh(&mut self) -> Result<(), HttpError> {
        self.detail = self.client.user(&self.detail.login).await?;
        Ok(())
    }

    /// Bring the balance to exactly `value` by posting the signed difference.
    ///
    /// Equal balances are a no-op. Without `refresh` the cached balance is
    /// updated locally.
    pub async fn set_correction_point(
        &mut self,
        value: i64,
        reason: &str,
        refresh: bool,
    ) -> Result<(), UserError> {
        if value < 0 {
            return Err(BalanceError { requested: value }.into());
        }

        let diff = value - self.detail.correction_point;
        if diff == 0 {
            return Ok(());
        }

        self.client
            .add_correction_points(&self.detail.login, diff, reason)
            .await?;

        if refresh {
            self.refresh().await?;
        } else {
            self.detail.correction_point = value;
        }
        Ok(())
    }

    /// Move every point above `target` into `pool_id`; returns the amount
    /// moved.
    ///
    /// The deduction and the pool credit are two separate API calls. A credit
    /// failing after the deduction is reported as [`UserError::PoolCredit`];
    /// the points are not restored.
    pub async fn transfer_excess(
        &mut self,
        target: i64,
        pool_id: i64,
        refresh: bool,
    ) -> Result<i64, UserError> {
        let diff = self.detail.correction_point - target;
        self.set_correction_point(target, REDISTRIBUTION_REASON, refresh)
            .await?;
        if diff <= 0 {
            return Ok(0);
        }

        if let Err(source) = self.client.pool_add_points(pool_id, diff).await {
            tracing::error!(
                login = %self.detail.login,
                points = diff,
                pool_id,
                error = %source,
                "pool credit failed after deduction"
            );
            return Err(UserError::PoolCredit {
                login: self.detail.login.clone(),
                points: diff,
                pool_id,
                source,
            });
        }
        Ok(diff)
    }

    /// Blackhole deadline in a cursus; `None` when no deadline is set.
    pub fn blackholed_at(&self, cursus_id: i64) -> Result<Option<DateTime<Utc>>, UserError> {
        self.detail
            .cursus(cursus_id)
            .map(|c| c.blackholed_at)
            .ok_or_else(|| UserError::NotEnrolled {
                login: self.detail.login.clone(),
                cursus_id,
            })
    }

    /// Whether the blackhole deadline in `cursus_id` has passed at `now`.
    pub fn is_blackholed(&self, cursus_id: i64, now: DateTime<Utc>) -> Result<bool, UserError> {
        Ok(self
            .blackholed_at(cursus_id)?
            .is_some_and(|deadline| deadline < now))
    }

    pub async fn change_email(&mut self, email: &str) -> Result<(), HttpError> {
        self.client.change_email(&self.detail.login, email).await?;
        self.detail.email = Some(email.to_string());
        Ok(())
    }
}
