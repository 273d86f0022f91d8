//!
//! Error handling for the Kiro to OpenAI proxy server.
//!
//! Defines all error types used throughout the application using thiserror
//! for ergonomic error handling. The variants mirror the failure taxonomy of
//! the proxy: edge authentication, request validation, upstream transport,
//! upstream rejection, and stream parsing.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use thiserror::Error;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application error types following Rust best practices.
///
/// Covers all possible error conditions that can occur during proxy operation.
/// Uses thiserror for automatic Display and Error trait implementations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or wrong proxy API key at the edge. Surfaced as 401.
    #[error("Proxy authentication error: {0}")]
    ProxyAuth(String),

    /// Request failed schema validation. Surfaced as 422.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The refresh endpoint rejected the refresh token. Terminal; surfaced as 401.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport-level failure talking to the upstream or refresh endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-retryable upstream rejection (4xx other than 401/403). Surfaced as 502.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// All retry attempts exhausted on transient failures. Surfaced as 503.
    #[error("Upstream unavailable after {attempts} attempt(s)")]
    UpstreamUnavailable { attempts: u32 },

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/* --- start of code -------------------------------------------------------------------------- */

/// Result type alias for cleaner error handling throughout the application
pub type Result<T> = std::result::Result<T, ProxyError>;
