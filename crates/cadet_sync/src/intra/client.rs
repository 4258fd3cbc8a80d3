//! Intra API client.
//!
//! [`IntraClient`] is the only egress point towards the Intra API: every call
//! is paced by the optional rate limiter, carries the current bearer token,
//! and is retried according to the client's [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::{HttpError, is_retryable};
use super::pagination::{self, PageStyle};
use super::rate_limit::ApiRateLimiter;
use super::types::{Filters, ListedUser, Pool, Project, UserDetail};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, with_query};
use crate::oauth::{ClientCredentials, TokenCache};
use crate::retry::{RetryPolicy, with_retry};
use crate::settings::IntraSettings;
use crate::sync::ProgressCallback;

/// Public Intra API root.
pub const DEFAULT_BASE_URL: &str = "https://api.intra.42.fr/v2";

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Body attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

/// Authenticated, rate-limited Intra API client.
///
/// Cloning is cheap; clones share the transport, the token cache and the
/// rate limiter.
#[derive(Clone)]
pub struct IntraClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    tokens: Arc<TokenCache>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryPolicy,
    page_size: u32,
}

impl IntraClient {
    /// Build a client from settings, using reqwest with the configured
    /// timeout and a rate limiter at `settings.rps`.
    pub fn new(settings: &IntraSettings) -> Result<Self, HttpError> {
        let credentials = settings.credentials()?;
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(settings.timeout_secs))
            .map_err(|e| HttpError::Transport {
                url: settings.base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(
            Self::with_transport(Arc::new(transport), &settings.base_url, credentials)
                .with_rate_limiter(Some(ApiRateLimiter::new(settings.rps)))
                .with_page_size(settings.page_size),
        )
    }

    /// Build a client over an arbitrary transport, without rate limiting.
    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        credentials: ClientCredentials,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let tokens = Arc::new(TokenCache::new(
            Arc::clone(&transport),
            &base_url,
            credentials,
        ));
        Self {
            transport,
            base_url,
            tokens,
            rate_limiter: None,
            retry: RetryPolicy::http_default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Option<ApiRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Absolute URL for an API path such as `/users/jdoe`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send a request, retrying transient failures.
    ///
    /// Fails with [`HttpError::Status`] when the API still answers with a
    /// non-2xx status once the retry budget is spent.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(String, String)],
        body: RequestBody,
    ) -> Result<HttpResponse, HttpError> {
        let url = with_query(&self.url(path), query);
        let label = format!("{} {}", method.as_str(), path);

        with_retry(
            || self.send_once(method, &url, &body),
            &self.retry,
            is_retryable,
            &label,
            None,
        )
        .await
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        body: &RequestBody,
    ) -> Result<HttpResponse, HttpError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let token = self.tokens.access_token().await?;
        let mut request = HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {token}"));
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Form(fields) => request.form(fields),
            RequestBody::Json(value) => request.json(value),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status == 401 {
            self.tokens.invalidate();
        }

        if !response.is_success() {
            tracing::debug!(
                status = response.status,
                method = method.as_str(),
                url,
                "intra request failed"
            );
            return Err(HttpError::Status {
                status: response.status,
                url: url.to_string(),
                body: response.text(),
            });
        }

        Ok(response)
    }

    /// GET a path and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, HttpError> {
        let response = self
            .request(HttpMethod::Get, path, query, RequestBody::Empty)
            .await?;
        decode(&self.url(path), &response)
    }

    pub async fn post_form(
        &self,
        path: &str,
        query: &[(String, String)],
        fields: Vec<(String, String)>,
    ) -> Result<HttpResponse, HttpError> {
        self.request(HttpMethod::Post, path, query, RequestBody::Form(fields))
            .await
    }

    pub async fn patch_json(&self, path: &str, value: Value) -> Result<HttpResponse, HttpError> {
        self.request(HttpMethod::Patch, path, &[], RequestBody::Json(value))
            .await
    }

    /// Raw user record, as stored in snapshots.
    pub async fn user_raw(&self, login: &str) -> Result<Value, HttpError> {
        self.get_json(&format!("/users/{login}"), &[]).await
    }

    pub async fn user(&self, login: &str) -> Result<UserDetail, HttpError> {
        self.get_json(&format!("/users/{login}"), &[]).await
    }

    /// Every user matching `filters` (paginated `/users`).
    pub async fn users(
        &self,
        filters: &Filters,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<ListedUser>, HttpError> {
        pagination::list_all(
            self,
            "/users",
            filters,
            self.page_size,
            PageStyle::Numbered,
            on_progress,
        )
        .await
    }

    /// Every user enrolled in a cursus (paginated `/cursus/{id}/users`).
    pub async fn cursus_users(
        &self,
        cursus_id: i64,
        filters: &Filters,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<ListedUser>, HttpError> {
        pagination::list_all(
            self,
            &format!("/cursus/{cursus_id}/users"),
            filters,
            self.page_size,
            PageStyle::Numbered,
            on_progress,
        )
        .await
    }

    /// Every project of a cursus (paginated `/cursus/{id}/projects`).
    pub async fn projects_by_cursus(
        &self,
        cursus_id: i64,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Project>, HttpError> {
        pagination::list_all(
            self,
            &format!("/cursus/{cursus_id}/projects"),
            &Filters::new(),
            self.page_size,
            PageStyle::Numbered,
            on_progress,
        )
        .await
    }

    pub async fn pool(&self, pool_id: i64) -> Result<Pool, HttpError> {
        self.get_json(&format!("/pools/{pool_id}"), &[]).await
    }

    /// Credit `points` to a shared pool.
    pub async fn pool_add_points(&self, pool_id: i64, points: i64) -> Result<(), HttpError> {
        self.post_form(
            &format!("/pools/{pool_id}/points/add"),
            &[],
            vec![("points".to_string(), points.to_string())],
        )
        .await?;
        Ok(())
    }

    /// Add `amount` (possibly negative) correction points to a user.
    pub async fn add_correction_points(
        &self,
        login: &str,
        amount: i64,
        reason: &str,
    ) -> Result<(), HttpError> {
        self.post_form(
            &format!("/users/{login}/correction_points/add"),
            &[
                ("reason".to_string(), reason.to_string()),
                ("amount".to_string(), amount.to_string()),
            ],
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    pub async fn change_email(&self, login: &str, email: &str) -> Result<(), HttpError> {
        self.patch_json(
            &format!("/users/{login}"),
            json!({"user": {"email": email}}),
        )
        .await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: &HttpResponse) -> Result<T, HttpError> {
    serde_json::from_slice(&response.body).map_err(|e| HttpError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
