//! HTTP request pipeline for the agentauri.ai API.
//!
//! [`ApiClient`] owns every piece of shared request state — the cookie
//! jar, the CSRF token cache, the refresh coordinator, and the
//! session-expiry guard — so tests can construct a fresh client against a
//! mock server instead of poking module globals.

pub mod csrf;
pub mod session;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorBody, Result};
use csrf::CsrfTokenCache;
use session::{SessionExpiryGuard, SessionRefreshCoordinator};

/// Header carrying the anti-CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Query parameter value. A `None` entry in [`RequestOptions::query`] is
/// dropped from the URL entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Float(v) => v.fmt(f),
            Self::Bool(v) => v.fmt(f),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Per-request options. Built per call, immutable once handed to a verb.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, Option<ParamValue>)>,
    pub headers: HeaderMap,
    /// Overrides the config default (30s).
    pub timeout: Option<Duration>,
    /// Set on the post-refresh re-issue so one logical request can never
    /// trigger a second refresh attempt.
    skip_refresh: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.push((name.into(), Some(value.into())));
        self
    }

    /// `None` values are dropped from the query string.
    pub fn with_optional_param<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        self.query.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Cookie-session HTTP client for the agentauri.ai API.
///
/// Session state lives in httpOnly cookies held by the client's cookie
/// jar; no token is ever exposed to calling code. Mutating verbs attach an
/// anti-CSRF token, and a 401 on a non-auth endpoint triggers one
/// coordinated session refresh followed by at most one re-issue.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    csrf: CsrfTokenCache,
    refresh: SessionRefreshCoordinator,
    expiry: SessionExpiryGuard,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            csrf: CsrfTokenCache::new(http.clone(), config.csrf_url()),
            refresh: SessionRefreshCoordinator::new(http.clone(), config.refresh_url()),
            expiry: SessionExpiryGuard::new(),
            http,
            config,
        })
    }

    /// Build a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Install the side effect run once when the session cannot be
    /// refreshed (e.g. prompt the user to sign in again). The handler fires
    /// at most once per client, no matter how many requests fail
    /// concurrently.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.expiry.set_hook(Arc::new(hook));
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>> {
        self.request::<serde_json::Value, T>(Method::GET, endpoint, None, options)
            .await
    }

    pub async fn post<B, T>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, endpoint, body, options).await
    }

    pub async fn put<B, T>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, endpoint, body, options).await
    }

    pub async fn patch<B, T>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, endpoint, body, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>> {
        self.request::<serde_json::Value, T>(Method::DELETE, endpoint, None, options)
            .await
    }

    /// Log out: POST the logout endpoint and drop the cached CSRF token.
    pub async fn logout(&self) -> Result<()> {
        self.csrf.clear();
        let response = self.http.post(self.config.logout_url()).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Logout returned an error");
        }
        Ok(())
    }

    async fn request<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.api_url(endpoint);
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let query: Vec<(&str, String)> = options
            .query
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.as_str(), v.to_string())))
            .collect();
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ClientError::Serialization)?;
        let mut skip_refresh = options.skip_refresh;

        loop {
            let headers = self
                .build_headers(&method, payload.is_some(), &options.headers)
                .await;
            let mut builder = self
                .http
                .request(method.clone(), url.as_str())
                .headers(headers)
                .query(&query);
            if let Some(payload) = &payload {
                builder = builder.body(payload.clone());
            }

            let response = match tokio::time::timeout(timeout, builder.send()).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) if e.is_timeout() => {
                    return Err(ClientError::Timeout(timeout.as_millis() as u64))
                }
                Ok(Err(e)) => return Err(ClientError::Network(e)),
                Err(_) => return Err(ClientError::Timeout(timeout.as_millis() as u64)),
            };

            let status = response.status();
            if status.is_success() {
                return parse_success(response).await;
            }

            let error = classify_response(response).await;

            if status == StatusCode::FORBIDDEN {
                // The token may have rotated server-side; refetch next time.
                self.csrf.clear();
            }

            if status == StatusCode::UNAUTHORIZED && !skip_refresh && !is_auth_endpoint(endpoint) {
                if self.refresh.attempt_refresh().await {
                    // Re-issue the identical request exactly once.
                    skip_refresh = true;
                    continue;
                }
                self.handle_session_expired();
            }

            return Err(error);
        }
    }

    async fn build_headers(
        &self,
        method: &Method,
        has_body: bool,
        extra: &HeaderMap,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }
        if has_body && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if is_mutating(method) {
            // Absence of a token is not fatal; the server decides.
            if let Some(token) = self.csrf.token().await {
                if let Ok(value) = HeaderValue::from_str(&token) {
                    headers.insert(CSRF_HEADER, value);
                }
            }
        }
        headers
    }

    fn handle_session_expired(&self) {
        if !self.expiry.fire() {
            return;
        }
        warn!("Session expired and refresh failed; running expiry handler");
        self.csrf.clear();
        // Fire-and-forget server-side cookie cleanup.
        let http = self.http.clone();
        let logout_url = self.config.logout_url();
        tokio::spawn(async move {
            let _ = http.post(logout_url).send().await;
        });
        if let Some(hook) = self.expiry.hook() {
            hook();
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

/// The auth surface handles its own 401s; refreshing there would loop.
fn is_auth_endpoint(endpoint: &str) -> bool {
    endpoint == "/auth" || endpoint.starts_with("/auth/")
}

/// Parse a successful response. Only a declared JSON content-type is
/// parsed; anything else (204, empty bodies, foreign types) yields `None`.
async fn parse_success<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if !is_json {
        return Ok(None);
    }
    let value = response.json::<T>().await?;
    Ok(Some(value))
}

/// Turn a non-2xx response into a classified error, tolerating non-JSON
/// error bodies.
async fn classify_response(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.json::<ErrorBody>().await.ok();
    let message = body
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    ClientError::Api {
        status,
        message,
        body,
    }
}
