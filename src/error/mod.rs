//! Error types for the agentauri client.

pub mod unified;

pub use unified::{handle_error, log_error, normalize_error, AppError, ErrorCode};

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Structured error body returned by the API on non-2xx responses.
///
/// All fields are optional; non-JSON bodies simply yield no `ErrorBody`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// Primary error type thrown by the request pipeline and the rate limiter.
///
/// This is the tagged union at the boundary where heterogeneous failures
/// originate; [`normalize_error`] folds it into an [`AppError`] with a
/// stable [`ErrorCode`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<ErrorBody>,
    },

    #[error("Rate limited: retry in {reset_in:?}")]
    RateLimited {
        reset_at: tokio::time::Instant,
        reset_in: Duration,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

impl ClientError {
    /// Create an API error without a structured body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// HTTP status associated with this error; 0 for transport-level
    /// failures (timeouts, connection errors).
    pub fn status(&self) -> u16 {
        match self {
            Self::Api { status, .. } => *status,
            Self::RateLimited { .. } => 429,
            Self::Network(e) => e.status().map(|s| s.as_u16()).unwrap_or(0),
            Self::App(app) => app.status.unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == 403
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == 429
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
