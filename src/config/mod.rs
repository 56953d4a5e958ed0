//! Client configuration (code > environment).

use std::time::Duration;

use crate::error::{ClientError, Result};

pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for an [`crate::client::ApiClient`].
///
/// `base_url` is required: the session-refresh and CSRF endpoints hang off
/// it, and a same-origin proxy deployment simply points it at the proxy.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    /// Versioned path of the CSRF token endpoint.
    pub csrf_path: String,
    /// Unversioned path of the session refresh endpoint.
    pub refresh_path: String,
    /// Unversioned path of the logout endpoint.
    pub logout_path: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            csrf_path: "/csrf-token".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            logout_path: "/api/auth/logout".to_string(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from environment variables (AGENTAURI_API_URL,
    /// AGENTAURI_API_VERSION, AGENTAURI_TIMEOUT_MS).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let base_url = std::env::var("AGENTAURI_API_URL")
            .map_err(|_| ClientError::Configuration("AGENTAURI_API_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Ok(version) = std::env::var("AGENTAURI_API_VERSION") {
            config.api_version = version;
        }
        if let Ok(raw) = std::env::var("AGENTAURI_TIMEOUT_MS") {
            let ms: u64 = raw.parse().map_err(|_| {
                ClientError::Configuration(format!("invalid AGENTAURI_TIMEOUT_MS: {raw}"))
            })?;
            config.timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Resolve a versioned API endpoint to an absolute URL.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}{}", self.base_url, self.api_version, endpoint)
    }

    pub fn csrf_url(&self) -> String {
        self.api_url(&self.csrf_path)
    }

    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.base_url, self.refresh_path)
    }

    pub fn logout_url(&self) -> String {
        format!("{}{}", self.base_url, self.logout_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_base_version_and_endpoint() {
        let config = ClientConfig::new("https://api.agentauri.ai/");
        assert_eq!(
            config.api_url("/agents/42"),
            "https://api.agentauri.ai/api/v1/agents/42"
        );
    }

    #[test]
    fn auth_endpoints_are_unversioned() {
        let config = ClientConfig::new("https://api.agentauri.ai");
        assert_eq!(
            config.refresh_url(),
            "https://api.agentauri.ai/api/auth/refresh"
        );
        assert_eq!(
            config.logout_url(),
            "https://api.agentauri.ai/api/auth/logout"
        );
        assert_eq!(
            config.csrf_url(),
            "https://api.agentauri.ai/api/v1/csrf-token"
        );
    }

    #[test]
    fn version_override_changes_api_paths() {
        let config = ClientConfig::new("http://localhost:3000").with_api_version("v2");
        assert_eq!(config.api_url("/events"), "http://localhost:3000/api/v2/events");
    }
}
