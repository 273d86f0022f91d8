//!
//! Configuration management for the Kiro to OpenAI proxy server.
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Follows Single Responsibility Principle - manages all configuration concerns.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::env;
use std::path::PathBuf;

use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application configuration structure.
///
/// Credentials come either from `KIRO_CREDS_FILE` (a flat JSON file written by
/// the Kiro IDE) or from the `REFRESH_TOKEN` / `PROFILE_ARN` environment
/// variables. Every other knob has a default matching the Kiro defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /** API key clients must present as a Bearer token on /v1 routes */
    pub proxy_api_key: String,
    /** AWS region used to derive the Kiro hosts */
    pub region: String,
    /** refresh token when credentials come from the environment */
    pub refresh_token: Option<String>,
    /** CodeWhisperer profile ARN */
    pub profile_arn: Option<String>,
    /** path to the Kiro credentials JSON file */
    pub creds_file: Option<PathBuf>,
    /** override for the token refresh host (testing) */
    pub auth_host: Option<String>,
    /** override for the generation host (testing) */
    pub api_host: Option<String>,
    /** override for the model listing host (testing) */
    pub q_host: Option<String>,
    /** seconds before expiry at which a token is refreshed proactively */
    pub token_refresh_threshold: u64,
    /** maximum upstream attempts for transient failures */
    pub max_retries: u32,
    /** base delay in seconds for exponential backoff */
    pub base_retry_delay: f64,
    /** model metadata cache TTL in seconds */
    pub model_cache_ttl: u64,
    /** context window assumed for models the cache does not know */
    pub default_max_input_tokens: u32,
    /** tool descriptions longer than this are relocated to the system prompt */
    pub tool_description_max_length: usize,
    /** per-request upstream timeout in seconds */
    pub request_timeout: u64,
    /** HTTP server port number */
    pub port: u16,
    /** application logging level */
    pub log_level: LogLevel,
    /** whether to dump the last request/response to disk */
    pub debug_last_request: bool,
    /** directory receiving debug dumps */
    pub debug_dir: PathBuf,
}

///
/// Logging level enumeration.
///
/// Defines available log levels with helper methods for level checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

///
/// Configuration validation issue.
///
/// Represents a single validation problem found during configuration check.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Configuration field name
    pub field: String,
    /// Severity of the issue
    pub severity: ValidationSeverity,
    /// Description of the issue
    pub message: String,
    /// Optional suggestion for fixing the issue
    pub suggestion: Option<String>,
}

///
/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid and will cause failures
    Error,
    /// Warning - configuration may work but has potential issues
    Warning,
    /// Info - informational note about configuration
    Info,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Default AWS region for Kiro hosts */
const DEFAULT_REGION: &str = "us-east-1";

/** Default proactive refresh threshold in seconds */
const DEFAULT_REFRESH_THRESHOLD: u64 = 600;

/** Default maximum upstream attempts */
const DEFAULT_MAX_RETRIES: u32 = 3;

/** Default base backoff delay in seconds */
const DEFAULT_BASE_RETRY_DELAY: f64 = 1.0;

/** Default model cache TTL in seconds */
const DEFAULT_MODEL_CACHE_TTL: u64 = 3600;

/** Default context window when model metadata is unknown */
const DEFAULT_MAX_INPUT_TOKENS: u32 = 200_000;

/** Default maximum tool description length accepted by the upstream */
const DEFAULT_TOOL_DESCRIPTION_MAX_LENGTH: usize = 10_000;

/** Default per-request upstream timeout; the upstream streams slowly */
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/* --- start of code -------------------------------------------------------------------------- */

impl LogLevel {
    ///
    /// Check if trace-level logging is enabled.
    ///
    /// Returns true for Trace and Debug levels, which enable detailed logging
    /// of conversions and upstream interactions.
    ///
    /// # Returns
    ///  * `true` if trace logging should be enabled
    ///  * `false` otherwise
    pub fn is_trace_enabled(self) -> bool {
        matches!(self, LogLevel::Trace | LogLevel::Debug)
    }
}

impl From<&str> for LogLevel {
    ///
    /// Convert string representation to LogLevel enum.
    ///
    /// Case-insensitive conversion with Info as the default fallback.
    ///
    /// # Arguments
    ///  * `s` - string representation of log level
    ///
    /// # Returns
    ///  * Corresponding LogLevel enum value
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl Config {
    ///
    /// Load configuration from environment variables.
    ///
    /// Attempts to load a .env file if present, then reads configuration from
    /// environment variables with sensible defaults.
    ///
    /// # Returns
    ///  * Configuration object with all settings loaded
    ///  * `ProxyError::Config` if required variables are missing or invalid
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let proxy_api_key = env::var("PROXY_API_KEY").map_err(|_| {
            ProxyError::Config(
                "PROXY_API_KEY environment variable is not set.\n\
         \n\
         To fix this:\n\
           1. Choose a secret clients will present as their Bearer token\n\
           2. Set the environment variable:\n\
              export PROXY_API_KEY=\"your-secret\"\n\
           3. Or add it to a .env file:\n\
              PROXY_API_KEY=\"your-secret\"\n\
         \n\
         Run 'kiromux validate' for more help."
                    .to_string(),
            )
        })?;

        let refresh_token = env::var("REFRESH_TOKEN").ok();
        let creds_file = env::var("KIRO_CREDS_FILE").ok().map(PathBuf::from);

        if refresh_token.is_none() && creds_file.is_none() {
            return Err(ProxyError::Config(
                "Neither REFRESH_TOKEN nor KIRO_CREDS_FILE is set.\n\
         \n\
         To fix this:\n\
           1. Point KIRO_CREDS_FILE at the Kiro IDE credentials JSON, e.g.\n\
              export KIRO_CREDS_FILE=\"$HOME/.aws/sso/cache/kiro-auth-token.json\"\n\
           2. Or export the refresh token directly:\n\
              export REFRESH_TOKEN=\"your-refresh-token\"\n\
         \n\
         Run 'kiromux validate' for more help."
                    .to_string(),
            ));
        }

        Ok(Config {
            proxy_api_key,
            region: env::var("KIRO_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            refresh_token,
            profile_arn: env::var("PROFILE_ARN").ok(),
            creds_file,
            auth_host: env::var("KIRO_AUTH_HOST").ok(),
            api_host: env::var("KIRO_API_HOST").ok(),
            q_host: env::var("KIRO_Q_HOST").ok(),
            token_refresh_threshold: Self::get_u64(
                "TOKEN_REFRESH_THRESHOLD",
                DEFAULT_REFRESH_THRESHOLD,
            ),
            max_retries: Self::get_u32("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            base_retry_delay: Self::get_f64("BASE_RETRY_DELAY", DEFAULT_BASE_RETRY_DELAY),
            model_cache_ttl: Self::get_u64("MODEL_CACHE_TTL", DEFAULT_MODEL_CACHE_TTL),
            default_max_input_tokens: Self::get_u32(
                "DEFAULT_MAX_INPUT_TOKENS",
                DEFAULT_MAX_INPUT_TOKENS,
            ),
            tool_description_max_length: Self::get_u64(
                "TOOL_DESCRIPTION_MAX_LENGTH",
                DEFAULT_TOOL_DESCRIPTION_MAX_LENGTH as u64,
            ) as usize,
            request_timeout: Self::get_u64("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS),
            port: Self::get_port()?,
            log_level: Self::get_log_level(),
            debug_last_request: Self::get_bool("DEBUG_LAST_REQUEST", false),
            debug_dir: env::var("DEBUG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
                PathBuf::from("debug")
            }),
        })
    }

    ///
    /// Get the server port from environment or use default.
    ///
    /// # Returns
    ///  * Port number as u16
    ///  * `ProxyError::Config` if port value is invalid
    fn get_port() -> Result<u16> {
        env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|e| {
                ProxyError::Config(format!(
                    "Invalid PORT value: {}\n\
         \n\
         PORT must be a number between 1 and 65535.\n\
            Example: export PORT=8000\n\
         \n\
         Run 'kiromux validate' for more help.",
                    e
                ))
            })
    }

    ///
    /// Get the log level from environment or use default.
    ///
    /// # Returns
    ///  * LogLevel enum value
    fn get_log_level() -> LogLevel {
        let log_level_str = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        LogLevel::from(log_level_str.as_str())
    }

    fn get_u64(name: &str, default: u64) -> u64 {
        env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_u32(name: &str, default: u32) -> u32 {
        env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_f64(name: &str, default: f64) -> f64 {
        env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_bool(name: &str, default: bool) -> bool {
        env::var(name)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(default)
    }

    ///
    /// Validate configuration and return detailed validation results.
    ///
    /// Checks all configuration values for correctness and provides helpful
    /// suggestions for any issues found.
    ///
    /// # Returns
    ///  * Vector of validation issues (empty if all valid)
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.proxy_api_key.len() < 8 {
            issues.push(ValidationIssue {
                field: "PROXY_API_KEY".to_string(),
                severity: ValidationSeverity::Warning,
                message: "Proxy API key is very short".to_string(),
                suggestion: Some("Use a key of at least 8 characters".to_string()),
            });
        }

        if let Some(path) = &self.creds_file {
            if !path.exists() {
                issues.push(ValidationIssue {
                    field: "KIRO_CREDS_FILE".to_string(),
                    severity: ValidationSeverity::Error,
                    message: format!("Credentials file does not exist: {}", path.display()),
                    suggestion: Some(
                        "Log in with the Kiro IDE once to create it, or set REFRESH_TOKEN"
                            .to_string(),
                    ),
                });
            }
        }

        if self.port == 0 {
            issues.push(ValidationIssue {
                field: "PORT".to_string(),
                severity: ValidationSeverity::Error,
                message: "Port cannot be 0".to_string(),
                suggestion: Some("Use a valid port number between 1 and 65535".to_string()),
            });
        }

        if self.max_retries == 0 {
            issues.push(ValidationIssue {
                field: "MAX_RETRIES".to_string(),
                severity: ValidationSeverity::Warning,
                message: "MAX_RETRIES is 0; transient upstream failures will not be retried"
                    .to_string(),
                suggestion: Some("Set MAX_RETRIES to a value between 1 and 5".to_string()),
            });
        }

        if self.max_retries > 10 {
            issues.push(ValidationIssue {
                field: "MAX_RETRIES".to_string(),
                severity: ValidationSeverity::Warning,
                message: format!("MAX_RETRIES ({}) is very high", self.max_retries),
                suggestion: Some(
                    "Consider using a lower value (3-5) to avoid excessive retries".to_string(),
                ),
            });
        }

        if self.request_timeout < 60 {
            issues.push(ValidationIssue {
                field: "REQUEST_TIMEOUT".to_string(),
                severity: ValidationSeverity::Info,
                message: format!(
                    "REQUEST_TIMEOUT ({}) is short; the upstream can stream for minutes",
                    self.request_timeout
                ),
                suggestion: Some("300 seconds or more is recommended".to_string()),
            });
        }

        issues
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_string() {
        assert_eq!(LogLevel::from("trace"), LogLevel::Trace);
        assert_eq!(LogLevel::from("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from("Info"), LogLevel::Info);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_trace_enabled() {
        assert!(LogLevel::Trace.is_trace_enabled());
        assert!(LogLevel::Debug.is_trace_enabled());
        assert!(!LogLevel::Info.is_trace_enabled());
        assert!(!LogLevel::Error.is_trace_enabled());
    }

    #[test]
    fn test_validate_flags_zero_port() {
        let config = test_config();
        let mut bad = config.clone();
        bad.port = 0;
        let issues = bad.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "PORT" && i.severity == ValidationSeverity::Error));
    }

    #[test]
    fn test_validate_flags_excessive_retries() {
        let mut config = test_config();
        config.max_retries = 50;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.field == "MAX_RETRIES"));
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let issues = test_config().validate();
        assert!(issues.iter().all(|i| i.severity != ValidationSeverity::Error));
    }

    pub(crate) fn test_config() -> Config {
        Config {
            proxy_api_key: "test-proxy-key".to_string(),
            region: "us-east-1".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            profile_arn: Some("arn:aws:codewhisperer:us-east-1:000000000000:profile/test".to_string()),
            creds_file: None,
            auth_host: None,
            api_host: None,
            q_host: None,
            token_refresh_threshold: 600,
            max_retries: 3,
            base_retry_delay: 1.0,
            model_cache_ttl: 3600,
            default_max_input_tokens: 200_000,
            tool_description_max_length: 10_000,
            request_timeout: 300,
            port: 8000,
            log_level: LogLevel::Info,
            debug_last_request: false,
            debug_dir: PathBuf::from("debug"),
        }
    }
}
