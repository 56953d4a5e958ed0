//! Session refresh coordination and expiry handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tracing::warn;

type InflightRefresh = Shared<BoxFuture<'static, bool>>;

/// Diagnostic body the refresh endpoint may return on failure.
#[derive(Debug, Default, Deserialize)]
struct RefreshFailureBody {
    code: Option<String>,
    error: Option<String>,
}

/// Single-flight coordinator for session refresh.
///
/// When several concurrent requests observe an expired session at once,
/// only one refresh round-trip is issued; every caller awaits the same
/// in-flight attempt and observes its outcome. The handle is cleared once
/// the shared attempt settles, success or failure, so a later 401 can
/// trigger a fresh attempt.
pub struct SessionRefreshCoordinator {
    http: reqwest::Client,
    endpoint: String,
    inflight: Mutex<Option<InflightRefresh>>,
}

impl SessionRefreshCoordinator {
    pub(crate) fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self {
            http,
            endpoint,
            inflight: Mutex::new(None),
        }
    }

    /// Attempt to refresh the session. Returns `true` when the session was
    /// refreshed and the original request should be re-issued.
    pub async fn attempt_refresh(&self) -> bool {
        let refresh = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.as_ref() {
                Some(refresh) => refresh.clone(),
                None => {
                    let refresh = do_refresh(self.http.clone(), self.endpoint.clone())
                        .boxed()
                        .shared();
                    *inflight = Some(refresh.clone());
                    refresh
                }
            }
        };

        let refreshed = refresh.clone().await;

        {
            let mut inflight = self.inflight.lock().unwrap();
            if inflight.as_ref().is_some_and(|r| r.ptr_eq(&refresh)) {
                *inflight = None;
            }
        }

        refreshed
    }
}

async fn do_refresh(http: reqwest::Client, endpoint: String) -> bool {
    let response = match http.post(&endpoint).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Session refresh request failed");
            return false;
        }
    };
    if response.status().is_success() {
        return true;
    }
    let status = response.status();
    let body = response
        .json::<RefreshFailureBody>()
        .await
        .unwrap_or_default();
    warn!(
        status = %status,
        code = ?body.code,
        error = ?body.error,
        "Session refresh rejected"
    );
    false
}

/// One-shot guard around the session-expired side effect, so a burst of
/// concurrent 401s runs the handler exactly once.
pub(crate) struct SessionExpiryGuard {
    fired: AtomicBool,
    hook: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl SessionExpiryGuard {
    pub(crate) fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            hook: Mutex::new(None),
        }
    }

    pub(crate) fn set_hook(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    /// Returns `true` for the first caller only.
    pub(crate) fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn hook(&self) -> Option<Arc<dyn Fn() + Send + Sync>> {
        self.hook.lock().unwrap().clone()
    }
}
