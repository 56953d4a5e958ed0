//! agentauri-client — Rust client SDK for the agentauri.ai API.
//!
//! Cookie-session HTTP client for the reputation-monitoring backend, with
//! CSRF protection, single-flight session refresh, client-side rate
//! limiting, structured error classification, and retry with exponential
//! backoff.
//!
//! # Quick Start
//!
//! ```no_run
//! use agentauri_client::prelude::*;
//!
//! # async fn example() -> agentauri_client::error::Result<()> {
//! let client = ApiClient::new(ClientConfig::new("https://api.agentauri.ai"))?;
//! let agent: Option<serde_json::Value> =
//!     client.get("/agents/42", RequestOptions::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod ratelimit;
pub mod util;
