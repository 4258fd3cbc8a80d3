//! Error types for Intra API operations.

use thiserror::Error;

use crate::oauth::AuthError;

/// Errors that can occur when talking to the Intra API.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The API answered with a non-2xx status after retries were exhausted.
    #[error("intra returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The request never produced a response.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A 2xx body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// No access token could be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl HttpError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Whether a request failing with `err` may succeed if sent again.
///
/// Rate limiting (429), server errors (5xx) and transport failures are
/// retried. Other client errors, decode failures and token exchange
/// failures are permanent.
pub fn is_retryable(err: &HttpError) -> bool {
    match err {
        HttpError::Status { status, .. } => *status == 429 || *status >= 500,
        HttpError::Transport { .. } => true,
        HttpError::Decode { .. } => false,
        HttpError::Auth(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, body: &str) -> HttpError {
        HttpError::Status {
            status: code,
            url: "https://api.intra.42.fr/v2/users/jdoe".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(&status(429, "")));
        assert!(is_retryable(&status(502, "")));
        assert!(!is_retryable(&status(404, "")));
        assert!(!is_retryable(&status(422, "")));
        assert!(is_retryable(&HttpError::Transport {
            url: String::new(),
            message: "connection reset".to_string(),
        }));
        assert!(!is_retryable(&HttpError::Decode {
            url: String::new(),
            message: "eof".to_string(),
        }));
        assert!(!is_retryable(&HttpError::Auth(AuthError::configuration(
            "missing"
        ))));
        assert!(!is_retryable(&HttpError::Auth(AuthError::Rejected {
            status: 503,
            body: String::new(),
        })));
        assert!(!is_retryable(&HttpError::Auth(AuthError::Transport(
            "connection reset".to_string()
        ))));
    }

    #[test]
    fn status_accessor_and_not_found() {
        assert_eq!(status(404, "").status(), Some(404));
        assert!(status(404, "").is_not_found());
        assert_eq!(
            HttpError::Transport {
                url: String::new(),
                message: String::new()
            }
            .status(),
            None
        );
    }
}
