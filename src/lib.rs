//! # Kiromux - Kiro to OpenAI Proxy Library
//!
//! This crate provides a proxy server that presents an OpenAI-compatible
//! chat-completions API and translates each request into the native protocol
//! of the Kiro (AWS CodeWhisperer) code-assistant upstream. While primarily
//! designed as a binary application, this library exposes its core
//! functionality for programmatic use.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use kiromux::{Config, create_app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let config = Config::from_env()?;
//!
//!     // Create the application
//!     let app = create_app(config)?;
//!
//!     // Start server
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration management and environment variable handling
//! - [`auth`] - Kiro credential store and token refresh
//! - [`client`] - Retry-capable upstream HTTP client
//! - [`models`] - Model name mapping and metadata cache
//! - [`converter`] - Format conversion between OpenAI and Kiro formats
//! - [`parser`] - Upstream event-stream parser
//! - [`server`] - HTTP server setup and route handlers
//! - [`debug`] - Last-request debug dumps
//! - [`ids`] - Identifier and fingerprint helpers
//! - [`error`] - Error types and handling

pub mod auth;
pub mod client;
pub mod config;
pub mod converter;
pub mod debug;
pub mod error;
pub mod ids;
pub mod models;
pub mod parser;
pub mod server;

// Re-export commonly used types
pub use config::{Config, ValidationIssue, ValidationSeverity};
pub use error::ProxyError;

/// The version as defined in cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Creates a new Kiromux application with the given configuration.
///
/// This is a convenience function that sets up the full application stack
/// including authentication, routing, and middleware.
///
/// # Arguments
///
/// * `config` - Application configuration
///
/// # Returns
///
/// Returns an Axum Router that can be served directly.
///
/// # Errors
///
/// Returns a `ProxyError` if credential loading or client setup fails.
///
/// # Examples
///
/// ```rust,no_run
/// use kiromux::{Config, create_app};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env()?;
///     let app = create_app(config)?;
///
///     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
///     axum::serve(listener, app).await?;
///     Ok(())
/// }
/// ```
pub fn create_app(config: Config) -> Result<axum::Router, ProxyError> {
    use axum::Router;
    use axum::routing::{get, post};
    use std::sync::Arc;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let app_state = Arc::new(server::AppState::new(config)?);

    Ok(Router::new()
        .route("/", get(server::root))
        .route("/health", get(server::health))
        .route("/v1/models", get(server::models))
        .route("/v1/chat/completions", post(server::chat_completions))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
