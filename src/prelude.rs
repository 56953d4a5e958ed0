//! Convenience re-exports for common use.

pub use crate::client::{ApiClient, ParamValue, RequestOptions};
pub use crate::config::ClientConfig;
pub use crate::error::{normalize_error, AppError, ClientError, ErrorCode, Result};
pub use crate::ratelimit::{RateLimitConfig, RateLimiter};
pub use crate::util::retry::RetryPolicy;
