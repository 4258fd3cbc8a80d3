//! Transport seam shared by the Intra client, the token exchange and webhook delivery.
//!
//! Everything above this module builds [`HttpRequest`] values and reads
//! [`HttpResponse`] values; only [`reqwest_transport`] touches the network.

use async_trait::async_trait;
use thiserror::Error;

/// Verbs the Intra API and webhook endpoints are called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list; lookups ignore ASCII case.
pub type HttpHeaders = Vec<(String, String)>;

/// One field of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    /// Set for file uploads.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FormPart {
    #[must_use]
    pub fn text(name: impl Into<String>, content_type: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: Some(content_type.to_string()),
            data: value.into().into_bytes(),
        }
    }

    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: &str,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.to_string()),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
    /// Multipart fields. When non-empty they replace `body` and the
    /// transport sets the boundary content type itself.
    pub parts: Vec<FormPart>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: Vec::new(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Urlencoded form body, as the Intra write endpoints expect.
    #[must_use]
    pub fn form(self, fields: &[(String, String)]) -> Self {
        self.with_body(
            "application/x-www-form-urlencoded",
            encode_form(fields).into_bytes(),
        )
    }

    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.with_body("application/json", value.to_string().into_bytes())
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body.clear();
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        self.parts = parts;
        self
    }

    fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.body = body;
        self.header("Content-Type", content_type)
    }

    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    /// Any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// Body as text; invalid UTF-8 is replaced.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, TLS, connect or timeout failure. No status was received.
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
}

#[must_use]
pub fn encode_form(fields: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Append `params` to `base` in the given order.
///
/// Intra filter keys such as `filter[primary_campus_id]` are percent-encoded.
#[must_use]
pub fn with_query(base: &str, params: &[(String, String)]) -> String {
    match (params.is_empty(), base.contains('?')) {
        (true, _) => base.to_string(),
        (false, true) => format!("{base}&{}", encode_form(params)),
        (false, false) => format!("{base}?{}", encode_form(params)),
    }
}

pub mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{
        FormPart, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
        TransportError,
    };

    impl From<HttpMethod> for reqwest::Method {
        fn from(method: HttpMethod) -> Self {
            match method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Patch => reqwest::Method::PATCH,
            }
        }
    }

    fn transport_error(err: reqwest::Error) -> TransportError {
        TransportError::Transport(err.to_string())
    }

    fn multipart_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, TransportError> {
        parts.into_iter().try_fold(reqwest::multipart::Form::new(), |form, part| {
            let mut field = reqwest::multipart::Part::bytes(part.data);
            if let Some(filename) = part.filename {
                field = field.file_name(filename);
            }
            if let Some(content_type) = &part.content_type {
                field = field.mime_str(content_type).map_err(transport_error)?;
            }
            Ok(form.part(part.name, field))
        })
    }

    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Client with a per-request timeout and the crate user agent.
        pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
            reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("cadet-sync/", env!("CARGO_PKG_VERSION")))
                .build()
                .map(Self::new)
                .map_err(transport_error)
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let HttpRequest {
                method,
                url,
                headers,
                body,
                parts,
            } = request;

            let mut builder = headers
                .iter()
                .fold(self.client.request(method.into(), &url), |b, (k, v)| {
                    b.header(k.as_str(), v.as_str())
                });
            if !parts.is_empty() {
                builder = builder.multipart(multipart_form(parts)?);
            } else if !body.is_empty() {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            let headers: HttpHeaders = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(transport_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

#[cfg(test)]
pub use mock::MockTransport;

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard};

    use async_trait::async_trait;

    use super::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

    struct Route {
        method: HttpMethod,
        url: String,
        responses: VecDeque<HttpResponse>,
    }

    #[derive(Default)]
    struct State {
        routes: Vec<Route>,
        sent: Vec<HttpRequest>,
    }

    /// Canned responses matched on method and exact URL, query included.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<State>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, State> {
            self.state.lock().expect("mock transport lock poisoned")
        }

        /// Queue a JSON response. Responses for one route are served in order.
        pub fn push_json(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            body: serde_json::Value,
        ) {
            let url = url.into();
            let response = HttpResponse {
                status,
                headers: vec![("Content-Type".into(), "application/json".into())],
                body: body.to_string().into_bytes(),
            };
            let mut state = self.state();
            match state
                .routes
                .iter_mut()
                .find(|r| r.method == method && r.url == url)
            {
                Some(route) => route.responses.push_back(response),
                None => state.routes.push(Route {
                    method,
                    url,
                    responses: VecDeque::from([response]),
                }),
            }
        }

        /// Every request sent so far, in order.
        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.state().sent.clone()
        }

        #[must_use]
        pub fn requests_to(&self, method: HttpMethod, prefix: &str) -> Vec<HttpRequest> {
            self.state()
                .sent
                .iter()
                .filter(|r| r.method == method && r.url.starts_with(prefix))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut state = self.state();
            let next = state
                .routes
                .iter_mut()
                .find(|r| r.method == request.method && r.url == request.url)
                .and_then(|r| r.responses.pop_front());
            let missing = TransportError::NoMockResponse {
                method: request.method.to_string(),
                url: request.url.clone(),
            };
            state.sent.push(request);
            next.ok_or(missing)
        }
    }
}
