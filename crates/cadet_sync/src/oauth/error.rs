//! Errors raised while obtaining an Intra access token.

use thiserror::Error;

/// Errors that can occur during the client-credentials exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Transport(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The token response was not the expected JSON document.
    #[error("failed to parse token response: {0}")]
    Parse(String),

    /// Client id or secret missing from configuration.
    #[error("oauth configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
