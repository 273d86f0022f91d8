//! # Kiromux - Kiro to OpenAI Proxy Server
//!
//! A proxy server that presents an OpenAI-compatible chat-completions API and
//! translates each request into the native protocol of the Kiro (AWS
//! CodeWhisperer) code-assistant upstream. Built with Rust following SOLID
//! principles for type safety, performance, and reliability.
//!
//! ## Features
//!
//! - **OpenAI-compatible API**: Drop-in replacement for OpenAI API endpoints
//! - **Tool/Function Calling**: Full support for OpenAI tool calling format,
//!   including bracket-style inline calls some upstream responses emit
//! - **Streaming Support**: Server-Sent Events (SSE) streaming responses
//! - **Token Lifecycle**: Proactive and reactive Kiro token refresh with
//!   credential persistence
//! - **Error Handling**: Comprehensive error handling with proper Result types
//! - **Performance**: Async/await with Tokio for high concurrency
//! - **Configurable Logging**: Structured logging with tracing
//!
//! ## Configuration
//!
//! Configure the server using environment variables:
//!
//! ```bash
//! # Required: key clients present as their Bearer token
//! export PROXY_API_KEY="your-secret"
//!
//! # Required: credentials (file or refresh token)
//! export KIRO_CREDS_FILE="$HOME/.aws/sso/cache/kiro-auth-token.json"
//! # or: export REFRESH_TOKEN="..." PROFILE_ARN="..."
//!
//! # Optional
//! export KIRO_REGION=us-east-1
//! export PORT=8000
//! export LOG_LEVEL=info
//! ```
//!
//! ## API Usage
//!
//! ```bash
//! curl -X POST http://localhost:8000/v1/chat/completions \
//!   -H "Authorization: Bearer your-secret" \
//!   -H "Content-Type: application/json" \
//!   -d '{
//!     "model": "claude-sonnet-4-5",
//!     "messages": [{"role": "user", "content": "Hello!"}],
//!     "stream": true
//!   }'
//! ```
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.
//!
//! Authors: Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp
//!

/* --- uses ------------------------------------------------------------------------------------ */

use std::env;

use tracing::{Level, info};

use kiromux::config::{self, Config};
use kiromux::error::{ProxyError, Result};
use kiromux::{VERSION, create_app};

/* --- start of code -------------------------------------------------------------------------- */

///
/// Main application entry point for the Kiromux proxy server.
///
/// Initializes logging, loads configuration from environment variables,
/// creates the application, and starts the HTTP server.
#[tokio::main]
async fn main() {
    // Handle CLI arguments before config loading
    handle_cli_args();

    if let Err(e) = run().await {
        // Print error message line by line to ensure proper formatting
        let error_msg = format!("{}", e);
        eprintln!("Error:");
        for line in error_msg.lines() {
            eprintln!("{}", line);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    initialize_logging(&config);

    let app = create_app(config.clone())?;
    start_server(&config, app).await
}

///
/// Handle command line arguments like --version and --help before config loading.
///
/// This ensures these commands work even without proper configuration.
fn handle_cli_args() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return; // No arguments, proceed with normal startup
    }

    match args[1].as_str() {
        "--version" | "-V" => {
            println!("kiromux {}", VERSION);
            std::process::exit(0);
        }
        "--help" | "-h" => {
            print_help();
            std::process::exit(0);
        }
        "validate" => {
            let exit_code = run_validate();
            std::process::exit(exit_code);
        }
        _ => {
            if args[1].starts_with('-') {
                eprintln!("Error: Unknown option: {}", args[1]);
            } else {
                eprintln!("Error: Unknown command: {}", args[1]);
            }
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    }
}

///
/// Print help information for the Kiromux CLI.
fn print_help() {
    println!("Kiromux v{}", VERSION);
    println!("OpenAI-compatible proxy server for the Kiro (AWS CodeWhisperer) upstream");
    println!();
    println!("USAGE:");
    println!("    kiromux [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    validate            Validate configuration and exit");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help          Print help information");
    println!("    -V, --version       Print version information");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    PROXY_API_KEY             Bearer key clients must present (required)");
    println!("    KIRO_CREDS_FILE           Path to the Kiro credentials JSON file");
    println!("    REFRESH_TOKEN             Kiro refresh token (alternative to the file)");
    println!("    PROFILE_ARN               CodeWhisperer profile ARN");
    println!("    KIRO_REGION               AWS region (default: us-east-1)");
    println!("    TOKEN_REFRESH_THRESHOLD   Proactive refresh window in seconds (default: 600)");
    println!("    MAX_RETRIES               Upstream retry attempts (default: 3)");
    println!("    BASE_RETRY_DELAY          Base backoff delay in seconds (default: 1.0)");
    println!("    MODEL_CACHE_TTL           Model cache TTL in seconds (default: 3600)");
    println!("    PORT                      Server port (default: 8000)");
    println!(
        "    LOG_LEVEL                 Log level: trace, debug, info, warn, error (default: info)"
    );
    println!("    DEBUG_LAST_REQUEST        Dump the last request/response to DEBUG_DIR");
    println!();
    println!("EXAMPLES:");
    println!("    kiromux                     Start the proxy server");
    println!("    kiromux validate            Validate configuration and exit");
}

///
/// Run the validate command to validate configuration and exit.
///
/// Returns exit code 0 if valid, 1 if invalid.
fn run_validate() -> i32 {
    match Config::from_env() {
        Ok(config) => {
            let issues = config.validate();
            let errors: Vec<_> = issues
                .iter()
                .filter(|i| i.severity == config::ValidationSeverity::Error)
                .collect();

            if errors.is_empty() {
                println!("[OK] Configuration is valid");
                for issue in issues
                    .iter()
                    .filter(|i| i.severity != config::ValidationSeverity::Error)
                {
                    println!("  • {}: {}", issue.field, issue.message);
                    if let Some(suggestion) = &issue.suggestion {
                        println!("    Suggestion: {}", suggestion);
                    }
                }
                0
            } else {
                eprintln!("[ERROR] Configuration validation failed:");
                for issue in &errors {
                    eprintln!("  • {}: {}", issue.field, issue.message);
                    if let Some(suggestion) = &issue.suggestion {
                        eprintln!("    Suggestion: {}", suggestion);
                    }
                }
                1
            }
        }
        Err(e) => {
            eprintln!("[ERROR] Configuration error: {}", e);
            1
        }
    }
}

///
/// Initialize logging with the specified log level.
///
/// Sets up tracing subscriber with appropriate log level based on configuration.
///
/// # Arguments
///  * `config` - application configuration containing log level settings
fn initialize_logging(config: &Config) {
    let log_level = match config.log_level {
        config::LogLevel::Trace => Level::TRACE,
        config::LogLevel::Debug => Level::DEBUG,
        config::LogLevel::Info => Level::INFO,
        config::LogLevel::Warn => Level::WARN,
        config::LogLevel::Error => Level::ERROR,
    };

    tracing_subscriber::fmt().with_max_level(log_level).with_target(false).init();
}

///
/// Start the HTTP server and log startup information.
///
/// Binds to the configured port and starts serving requests.
///
/// # Arguments
///  * `config` - application configuration
///  * `app` - configured Axum application
///
/// # Returns
///  * `Ok(())` when server shuts down gracefully
///  * `ProxyError::Network` if server binding or startup fails
async fn start_server(config: &Config, app: axum::Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(|e| {
            let error_msg = format!("Failed to bind to port {}: {}", config.port, e);
            if e.to_string().to_lowercase().contains("address already in use") {
                ProxyError::Network(format!(
                    "{}\n\n\
                    Port {} is already in use. Either stop the other instance\n\
                    (lsof -i :{}) or choose a different port: export PORT={}",
                    error_msg,
                    config.port,
                    config.port,
                    config.port + 1
                ))
            } else {
                ProxyError::Network(error_msg)
            }
        })?;

    log_startup_info(config);

    axum::serve(listener, app)
        .await
        .map_err(|e| ProxyError::Network(format!("Server error: {}", e)))?;

    Ok(())
}

///
/// Log startup information and configuration details.
///
/// # Arguments
///  * `config` - application configuration
fn log_startup_info(config: &Config) {
    info!("Kiromux v{} running on port {}", VERSION, config.port);
    info!("Region: {}", config.region);
    info!("OpenAI-compatible endpoint: http://localhost:{}/v1", config.port);

    if config.debug_last_request {
        info!("Debug dumps enabled, writing to {}", config.debug_dir.display());
    }
}
