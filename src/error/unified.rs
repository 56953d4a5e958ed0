//! Unified error classification and user-facing messages.
//!
//! Every error that surfaces to application code is folded into an
//! [`AppError`] carrying a code from the closed [`ErrorCode`] set, so call
//! sites can branch on a stable taxonomy instead of raw statuses or
//! transport details.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use super::ClientError;

/// Fixed message used when an error carries nothing safe to show.
const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Machine-readable error code. Wire form is SCREAMING_SNAKE_CASE, matching
/// the `code` field the API returns in error bodies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    TokenExpired,
    InvalidCredentials,
    ValidationError,
    InvalidInput,
    DuplicateEntry,
    NotFound,
    ResourceConflict,
    RateLimitExceeded,
    InternalError,
    ServiceUnavailable,
    Timeout,
    NetworkError,
    RequestFailed,
    InsufficientCredits,
    TriggerLimitExceeded,
    InvalidWebhookUrl,
}

/// Normalized application error: stable code, optional HTTP status, and
/// optional structured details. Immutable once constructed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub status: Option<u16>,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether a retry could plausibly succeed. Validation, auth, and
    /// not-found errors never qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NetworkError | ErrorCode::Timeout | ErrorCode::ServiceUnavailable
        ) || self.status.is_some_and(|s| s >= 500)
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|s| (400..500).contains(&s))
    }

    /// Short, fixed sentence safe to show to an end user. Complete over the
    /// code set; raw messages are never surfaced.
    pub fn user_message(&self) -> &'static str {
        match self.code {
            ErrorCode::Unauthorized => "Please sign in to continue.",
            ErrorCode::Forbidden => "You don't have permission to do that.",
            ErrorCode::TokenExpired => "Your session has expired. Please sign in again.",
            ErrorCode::InvalidCredentials => "Incorrect email or password.",
            ErrorCode::ValidationError => "Some fields are invalid. Please review and try again.",
            ErrorCode::InvalidInput => "The provided input is invalid.",
            ErrorCode::DuplicateEntry => "An entry with that name already exists.",
            ErrorCode::NotFound => "The requested resource was not found.",
            ErrorCode::ResourceConflict => "This resource was modified elsewhere. Please reload.",
            ErrorCode::RateLimitExceeded => "Too many requests. Please wait a moment.",
            ErrorCode::InternalError => "Something went wrong on our end. Please try again.",
            ErrorCode::ServiceUnavailable => "The service is temporarily unavailable.",
            ErrorCode::Timeout => "The request timed out. Please try again.",
            ErrorCode::NetworkError => "Network error. Please check your connection.",
            ErrorCode::RequestFailed => "The request could not be completed.",
            ErrorCode::InsufficientCredits => "You don't have enough credits for this action.",
            ErrorCode::TriggerLimitExceeded => "You've reached your trigger limit for this plan.",
            ErrorCode::InvalidWebhookUrl => "The webhook URL is not valid.",
        }
    }
}

/// Map an HTTP status onto the fixed code table.
fn code_for_status(status: u16) -> ErrorCode {
    match status {
        401 => ErrorCode::Unauthorized,
        403 => ErrorCode::Forbidden,
        404 => ErrorCode::NotFound,
        429 => ErrorCode::RateLimitExceeded,
        500.. => ErrorCode::InternalError,
        _ => ErrorCode::RequestFailed,
    }
}

/// Fold any [`ClientError`] into an [`AppError`].
///
/// Idempotent: an error that is already an `AppError` passes through
/// unchanged. A recognized `code` string in a server error body overrides
/// the status table, so business errors like `INSUFFICIENT_CREDITS` keep
/// their own code.
pub fn normalize_error(error: ClientError) -> AppError {
    match error {
        ClientError::App(app) => app,
        ClientError::Api {
            status,
            message,
            body,
        } => {
            let body_code = body
                .as_ref()
                .and_then(|b| b.code.as_deref())
                .and_then(|c| c.parse::<ErrorCode>().ok());
            let message = body
                .as_ref()
                .and_then(|b| b.message.clone())
                .unwrap_or(message);
            AppError {
                code: body_code.unwrap_or_else(|| code_for_status(status)),
                message,
                status: Some(status),
                details: body.and_then(|b| b.details),
            }
        }
        ClientError::RateLimited { reset_in, .. } => AppError {
            code: ErrorCode::RateLimitExceeded,
            message: "Too many requests".to_string(),
            status: Some(429),
            details: Some(serde_json::json!({
                "reset_in_ms": reset_in.as_millis() as u64,
            })),
        },
        ClientError::Timeout(ms) => AppError::new(
            ErrorCode::Timeout,
            format!("Request timed out after {ms}ms"),
        ),
        ClientError::Network(e) => {
            if e.is_timeout() {
                AppError::new(ErrorCode::Timeout, e.to_string())
            } else {
                AppError::new(ErrorCode::NetworkError, e.to_string())
            }
        }
        ClientError::Configuration(message) => AppError::new(ErrorCode::InternalError, message),
        ClientError::Serialization(_) => {
            AppError::new(ErrorCode::InternalError, GENERIC_ERROR_MESSAGE)
        }
    }
}

/// Log a normalized error. Debug builds get the full structured detail;
/// release builds log only code and message.
pub fn log_error(error: &AppError) {
    if cfg!(debug_assertions) {
        tracing::error!(
            code = %error.code,
            status = ?error.status,
            details = ?error.details,
            "{}", error.message,
        );
    } else {
        tracing::error!(code = %error.code, "{}", error.message);
    }
}

/// Normalize, log, and return the error. The usual entry point for call
/// sites that report failures to the user.
pub fn handle_error(error: ClientError) -> AppError {
    let app = normalize_error(error);
    log_error(&app);
    app
}
