//! Client-side sliding-window rate limiting.
//!
//! Gates request frequency before dispatch so the UI never hammers the API
//! past its documented limits. Windows are tracked per `key:identifier`
//! pair; expired entries are swept opportunistically rather than by a
//! background timer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ClientError, Result};
use crate::util::rand_factor;

/// Probability of sweeping expired entries on any given check.
const SWEEP_PROBABILITY: f64 = 0.1;

/// Window configuration for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Named presets documenting intended call-site configuration. The limiter
/// itself does not enforce which preset a call site uses.
pub mod presets {
    use std::time::Duration;

    use super::RateLimitConfig;

    /// Login / signup attempts: 5 per 15 minutes.
    pub const AUTH: RateLimitConfig = RateLimitConfig {
        max_requests: 5,
        window: Duration::from_secs(15 * 60),
    };

    /// Trigger creation: 10 per hour.
    pub const TRIGGER_CREATE: RateLimitConfig = RateLimitConfig {
        max_requests: 10,
        window: Duration::from_secs(60 * 60),
    };

    /// Read-side API queries: 100 per minute.
    pub const API_QUERY: RateLimitConfig = RateLimitConfig {
        max_requests: 100,
        window: Duration::from_secs(60),
    };

    /// Form submissions: 20 per 5 minutes.
    pub const FORM_SUBMIT: RateLimitConfig = RateLimitConfig {
        max_requests: 20,
        window: Duration::from_secs(5 * 60),
    };

    /// Fallback for anything without a dedicated preset: 30 per minute.
    pub const GENERIC: RateLimitConfig = RateLimitConfig {
        max_requests: 30,
        window: Duration::from_secs(60),
    };
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
    pub reset_in: Duration,
}

impl RateLimitStatus {
    pub fn reset_in_secs(&self) -> u64 {
        self.reset_in.as_secs()
    }

    /// Whole minutes until reset, rounded up.
    pub fn reset_in_mins(&self) -> u64 {
        self.reset_in.as_secs().div_ceil(60)
    }
}

#[derive(Debug)]
struct Entry {
    count: u32,
    reset_at: Instant,
}

/// In-memory sliding-window counter keyed by action + optional identifier.
///
/// Owns its store exclusively; construct one per composition root (the
/// [`crate::client::ApiClient`] does not hold one — call sites wrap their
/// own operations).
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request against the window and report whether it is
    /// allowed.
    ///
    /// The counter increments even when the limit is already exceeded, so
    /// `reset_in` telemetry stays accurate for over-limit callers.
    pub fn check(
        &self,
        key: &str,
        identifier: Option<&str>,
        config: &RateLimitConfig,
    ) -> RateLimitStatus {
        let storage_key = storage_key(key, identifier);
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        // Amortized garbage collection; no background timer.
        if rand_factor() < SWEEP_PROBABILITY {
            entries.retain(|_, e| e.reset_at > now);
        }

        let entry = entries.entry(storage_key).or_insert(Entry {
            count: 0,
            reset_at: now + config.window,
        });
        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = now + config.window;
        }
        entry.count += 1;

        RateLimitStatus {
            allowed: entry.count <= config.max_requests,
            remaining: config.max_requests.saturating_sub(entry.count),
            reset_at: entry.reset_at,
            reset_in: entry.reset_at.saturating_duration_since(now),
        }
    }

    /// Forget one entry, restarting its window on the next check.
    pub fn reset(&self, key: &str, identifier: Option<&str>) {
        self.entries.lock().unwrap().remove(&storage_key(key, identifier));
    }

    /// Empty the store. Useful on logout and in tests.
    pub fn clear_all(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Like [`check`](Self::check) but returns
    /// [`ClientError::RateLimited`] when the request is not allowed.
    pub fn enforce(
        &self,
        key: &str,
        identifier: Option<&str>,
        config: &RateLimitConfig,
    ) -> Result<RateLimitStatus> {
        let status = self.check(key, identifier, config);
        if status.allowed {
            Ok(status)
        } else {
            Err(ClientError::RateLimited {
                reset_at: status.reset_at,
                reset_in: status.reset_in,
            })
        }
    }

    /// Gate an async operation behind [`enforce`](Self::enforce).
    pub async fn with_rate_limit<F, Fut, T>(
        &self,
        key: &str,
        config: &RateLimitConfig,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.enforce(key, None, config)?;
        operation().await
    }
}

fn storage_key(key: &str, identifier: Option<&str>) -> String {
    match identifier {
        Some(id) => format!("{key}:{id}"),
        None => key.to_string(),
    }
}
