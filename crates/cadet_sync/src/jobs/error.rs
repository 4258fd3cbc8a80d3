use thiserror::Error;

use crate::intra::{BalanceError, HttpError, UserError};
use crate::notify::{ConfigError, NotifyError};
use crate::repository::RepositoryError;
use crate::sync::SyncError;

/// Failure of a job run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error("intra request failed: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    User(UserError),

    /// Points were taken from a user but never reached the pool.
    #[error("{points} points deducted from {login} were not credited to pool {pool_id}: {source}")]
    PartialTransfer {
        login: String,
        points: i64,
        pool_id: i64,
        #[source]
        source: HttpError,
    },

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("failed to write report: {0}")]
    Report(#[from] csv::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("invalid arguments for task '{task}': {message}")]
    InvalidKwargs { task: String, message: String },

    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

impl From<UserError> for JobError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Balance(e) => JobError::Balance(e),
            UserError::Http(e) => JobError::Http(e),
            UserError::PoolCredit {
                login,
                points,
                pool_id,
                source,
            } => JobError::PartialTransfer {
                login,
                points,
                pool_id,
                source,
            },
            other => JobError::User(other),
        }
    }
}

impl JobError {
    pub fn invalid_kwargs(task: &str, message: impl Into<String>) -> Self {
        Self::InvalidKwargs {
            task: task.to_string(),
            message: message.into(),
        }
    }

    /// Configuration problems abort a job without retrying.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            JobError::Config(_)
                | JobError::Notify(NotifyError::Config(_))
                | JobError::Balance(_)
                | JobError::InvalidKwargs { .. }
                | JobError::UnknownTask(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_flattened() {
        let err: JobError = UserError::Balance(BalanceError { requested: -3 }).into();
        assert!(matches!(err, JobError::Balance(BalanceError { requested: -3 })));
        assert!(err.is_configuration());

        let err: JobError = UserError::NotEnrolled {
            login: "jdoe".to_string(),
            cursus_id: 21,
        }
        .into();
        assert!(matches!(err, JobError::User(_)));
        assert!(!err.is_configuration());

        let err: JobError = UserError::PoolCredit {
            login: "jdoe".to_string(),
            points: 7,
            pool_id: 73,
            source: HttpError::Status {
                status: 500,
                url: String::new(),
                body: String::new(),
            },
        }
        .into();
        assert!(matches!(
            err,
            JobError::PartialTransfer { points: 7, pool_id: 73, .. }
        ));
    }

    #[test]
    fn missing_webhook_message_names_target() {
        let err: JobError = ConfigError::MissingWebhook {
            name: "socialism".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "no webhook target named 'socialism' is configured"
        );
    }
}
