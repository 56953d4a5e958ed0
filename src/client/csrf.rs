//! Anti-CSRF token cache with single-flight fetch.

use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tracing::warn;

type InflightFetch = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Deserialize)]
struct CsrfTokenResponse {
    token: String,
}

/// Cached anti-CSRF token, fetched lazily on the first mutating request.
///
/// CSRF protection is best-effort: a failed fetch is logged and yields
/// `None` rather than blocking the request that wanted the token.
/// Concurrent callers before the first fetch resolves share one in-flight
/// request.
pub struct CsrfTokenCache {
    http: reqwest::Client,
    endpoint: String,
    token: Mutex<Option<String>>,
    inflight: Mutex<Option<InflightFetch>>,
}

impl CsrfTokenCache {
    pub(crate) fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self {
            http,
            endpoint,
            token: Mutex::new(None),
            inflight: Mutex::new(None),
        }
    }

    /// Return the cached token, fetching it once on first use.
    pub async fn token(&self) -> Option<String> {
        if let Some(token) = self.token.lock().unwrap().clone() {
            return Some(token);
        }

        let fetch = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.as_ref() {
                Some(fetch) => fetch.clone(),
                None => {
                    let fetch = fetch_token(self.http.clone(), self.endpoint.clone())
                        .boxed()
                        .shared();
                    *inflight = Some(fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        // Clear the handle once the shared fetch has settled, so a later
        // clear-and-refetch starts a fresh request.
        {
            let mut inflight = self.inflight.lock().unwrap();
            if inflight.as_ref().is_some_and(|f| f.ptr_eq(&fetch)) {
                *inflight = None;
            }
        }

        if let Some(token) = &result {
            *self.token.lock().unwrap() = Some(token.clone());
        }
        result
    }

    /// Drop the cached token. Call on logout, or when the server rejects a
    /// request with 403 (the token may have rotated).
    pub fn clear(&self) {
        *self.token.lock().unwrap() = None;
    }
}

async fn fetch_token(http: reqwest::Client, endpoint: String) -> Option<String> {
    let response = match http.get(&endpoint).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "CSRF token fetch failed");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(status = %response.status(), "CSRF token endpoint returned an error");
        return None;
    }
    match response.json::<CsrfTokenResponse>().await {
        Ok(body) => Some(body.token),
        Err(e) => {
            warn!(error = %e, "CSRF token response was not valid JSON");
            None
        }
    }
}
