//! Client-credentials token cache for the Intra API.
//!
//! A single [`TokenCache`] is shared by every concurrent caller of the API
//! client. The cached token is read under a short-lived lock; an expired or
//! missing token is refreshed outside of any lock, so two callers racing on an
//! empty cache may both hit the token endpoint. The last writer wins, and both
//! tokens are valid.

mod error;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::http::{HttpMethod, HttpRequest, HttpTransport};

pub use error::AuthError;

/// Seconds shaved off the advertised lifetime so a token is never used right
/// at its expiry boundary.
pub const EXPIRY_MARGIN_SECS: u64 = 60;

/// OAuth application credentials.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Holds at most one valid bearer token and refreshes it on demand.
pub struct TokenCache {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
    credentials: ClientCredentials,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// `base_url` is the API root, e.g. `https://api.intra.42.fr/v2`.
    /// The token endpoint lives at `{base_url}/oauth/token`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            transport,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            credentials,
            slot: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Return a token valid at call time, exchanging credentials if the cached
    /// one is missing or expired.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached token so the next call performs a new exchange.
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn cached(&self) -> Option<String> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.access_token.clone())
    }

    async fn exchange(&self) -> Result<CachedToken, AuthError> {
        let request = HttpRequest::new(HttpMethod::Post, &self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("client_id".to_string(), self.credentials.client_id.clone()),
                (
                    "client_secret".to_string(),
                    self.credentials.client_secret.clone(),
                ),
            ]);

        let issued_at = Instant::now();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::Parse(e.to_string()))?;

        let lifetime = parsed.expires_in.saturating_sub(EXPIRY_MARGIN_SECS);
        tracing::debug!(lifetime_secs = lifetime, "obtained intra access token");

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: issued_at + Duration::from_secs(lifetime),
        })
    }
}
