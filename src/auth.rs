//!
//! Kiro authentication provider for upstream access.
//!
//! Owns the credential record (access token, refresh token, expiry, profile
//! ARN), refreshes it against the region-scoped Kiro refresh endpoint, and
//! persists refreshed credentials back to the JSON file they were loaded
//! from. Follows Single Responsibility Principle - only handles authentication.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::ids;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Kiro authentication provider.
///
/// Manages the credential record for the Kiro upstream. Proactive refresh
/// happens when the access token is missing or close to expiry; reactive
/// refresh is triggered by the request driver on an upstream 403. At most one
/// refresh is in flight per process; concurrent callers wait on the refresh
/// lock and observe the fresh token afterwards.
pub struct KiroAuthProvider {
    /** current credential record; replaced atomically under the write lock */
    credentials: RwLock<Credentials>,
    /** single-flight refresh lock */
    refresh_lock: Mutex<()>,
    /** credentials file to rewrite after refresh, if that was the source */
    creds_file: Option<PathBuf>,
    /** effective AWS region */
    region: String,
    /** refresh endpoint base URL */
    auth_host: String,
    /** generation endpoint base URL */
    api_host: String,
    /** model listing endpoint base URL */
    q_host: String,
    /** cached machine fingerprint */
    fingerprint: String,
    /** refresh proactively when this close to expiry */
    refresh_threshold: chrono::Duration,
    /** dedicated short-timeout client for refresh calls */
    http: reqwest::Client,
}

///
/// In-memory credential record.
#[derive(Debug, Clone)]
struct Credentials {
    access_token: Option<String>,
    refresh_token: String,
    expires_at: Option<DateTime<Utc>>,
    profile_arn: Option<String>,
}

///
/// Response body of the refresh endpoint.
///
/// A missing `expiresAt` is permitted and recorded as unknown expiry.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<String>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Total timeout for one refresh HTTP call */
const REFRESH_TIMEOUT_SECS: u64 = 15;

/** Connect timeout for refresh calls */
const REFRESH_CONNECT_TIMEOUT_SECS: u64 = 10;

/** ISO-8601 rendering used in the credentials file (UTC, milliseconds, Z) */
const EXPIRES_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/* --- start of code -------------------------------------------------------------------------- */

impl KiroAuthProvider {
    ///
    /// Create a new authentication provider.
    ///
    /// Loads the credential record from `KIRO_CREDS_FILE` when configured,
    /// falling back to the `REFRESH_TOKEN` / `PROFILE_ARN` environment
    /// configuration. The region from the credentials file wins over the
    /// configured one, and all upstream hosts are derived from it unless
    /// explicitly overridden.
    ///
    /// # Arguments
    ///  * `config` - application configuration
    ///
    /// # Returns
    ///  * New provider instance
    ///  * `ProxyError::Config` if no refresh token can be found
    pub fn new(config: &Config) -> Result<Self> {
        let mut region = config.region.clone();
        let mut refresh_token = config.refresh_token.clone();
        let mut profile_arn = config.profile_arn.clone();
        let mut access_token = None;
        let mut expires_at = None;

        if let Some(path) = &config.creds_file {
            let file = Self::read_creds_file(path)?;
            if let Some(token) = file.get("accessToken").and_then(Value::as_str) {
                access_token = Some(token.to_string());
            }
            if let Some(token) = file.get("refreshToken").and_then(Value::as_str) {
                refresh_token = Some(token.to_string());
            }
            if let Some(raw) = file.get("expiresAt").and_then(Value::as_str) {
                expires_at = Self::parse_expires_at(raw);
            }
            if let Some(arn) = file.get("profileArn").and_then(Value::as_str) {
                profile_arn = Some(arn.to_string());
            }
            if let Some(file_region) = file.get("region").and_then(Value::as_str) {
                region = file_region.to_string();
            }
        }

        let refresh_token = refresh_token.ok_or_else(|| {
            ProxyError::Config(
                "No refresh token available: set REFRESH_TOKEN or point KIRO_CREDS_FILE at a \
                 credentials file containing refreshToken"
                    .to_string(),
            )
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REFRESH_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(REFRESH_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProxyError::Network(format!("Failed to create refresh client: {}", e)))?;

        Ok(Self {
            credentials: RwLock::new(Credentials {
                access_token,
                refresh_token,
                expires_at,
                profile_arn,
            }),
            refresh_lock: Mutex::new(()),
            creds_file: config.creds_file.clone(),
            auth_host: config
                .auth_host
                .clone()
                .unwrap_or_else(|| format!("https://prod.{}.auth.desktop.kiro.dev", region)),
            api_host: config
                .api_host
                .clone()
                .unwrap_or_else(|| format!("https://codewhisperer.{}.amazonaws.com", region)),
            q_host: config
                .q_host
                .clone()
                .unwrap_or_else(|| format!("https://q.{}.amazonaws.com", region)),
            region,
            fingerprint: ids::machine_fingerprint(),
            refresh_threshold: chrono::Duration::seconds(config.token_refresh_threshold as i64),
            http,
        })
    }

    ///
    /// Get a currently-valid access token.
    ///
    /// Refreshes first when the token is missing or within the refresh
    /// threshold of its expiry. Concurrent callers block behind the single
    /// in-flight refresh and all observe the same new token.
    ///
    /// # Returns
    ///  * Valid access token string
    ///  * `ProxyError::Auth` if the refresh endpoint rejects the refresh token
    ///  * `ProxyError::Network` on transport failures
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.current_valid_token().await {
            return Ok(token);
        }
        self.refresh(false).await
    }

    ///
    /// Unconditionally refresh the access token.
    ///
    /// Used reactively when the upstream rejects a request with 403. Same
    /// exclusion discipline as the proactive path.
    ///
    /// # Returns
    ///  * Fresh access token string
    ///  * `ProxyError::Auth` / `ProxyError::Network` as for `access_token`
    pub async fn force_refresh(&self) -> Result<String> {
        self.refresh(true).await
    }

    /// Profile ARN from the credential record.
    pub async fn profile_arn(&self) -> Option<String> {
        self.credentials.read().await.profile_arn.clone()
    }

    /// Effective AWS region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Base URL of the generation endpoint.
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Base URL of the model listing endpoint.
    pub fn q_host(&self) -> &str {
        &self.q_host
    }

    /// Machine fingerprint carried in upstream headers.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    ///
    /// Return the current token if it is present and not close to expiry.
    ///
    /// A record with unknown expiry is treated as usable; stale tokens in that
    /// state are caught reactively by the 403 path.
    async fn current_valid_token(&self) -> Option<String> {
        let creds = self.credentials.read().await;
        let token = creds.access_token.clone()?;
        match creds.expires_at {
            Some(expires_at) if expires_at - Utc::now() <= self.refresh_threshold => None,
            _ => Some(token),
        }
    }

    ///
    /// Perform one refresh under the single-flight lock.
    ///
    /// After acquiring the lock the freshness check is repeated: a caller that
    /// queued behind an in-flight refresh finds the record already renewed and
    /// returns it without a second upstream call. `force` skips that check.
    async fn refresh(&self, force: bool) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if !force {
            if let Some(token) = self.current_valid_token().await {
                return Ok(token);
            }
        }

        let refresh_token = self.credentials.read().await.refresh_token.clone();
        let response = self.request_refresh(&refresh_token).await?;

        let expires_at = response.expires_at.as_deref().and_then(Self::parse_expires_at);
        if expires_at.is_none() {
            tracing::debug!("Refresh response carried no expiresAt; expiry recorded as unknown");
        }

        {
            let mut creds = self.credentials.write().await;
            creds.access_token = Some(response.access_token.clone());
            if let Some(new_refresh) = response.refresh_token {
                creds.refresh_token = new_refresh;
            }
            creds.expires_at = expires_at;
        }

        if let Err(e) = self.persist().await {
            // In-memory state is already updated; a persistence failure only
            // costs a refresh on the next restart.
            tracing::warn!("Failed to persist refreshed credentials: {}", e);
        }

        tracing::info!("Kiro access token refreshed");
        Ok(response.access_token)
    }

    ///
    /// POST the refresh token to the region-scoped refresh endpoint.
    ///
    /// Transient failures (transport errors, 5xx) are retried once before
    /// surfacing. 401/403 and `invalid_grant` responses are terminal.
    async fn request_refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let url = format!("{}/refreshToken", self.auth_host);
        let body = serde_json::json!({ "refreshToken": refresh_token });

        let mut last_error = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tracing::warn!("Retrying token refresh after transient failure");
            }

            let result = self.http.post(&url).json(&body).send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<RefreshResponse>()
                            .await
                            .map_err(|e| ProxyError::Network(format!("Malformed refresh response: {}", e)));
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 401 || text.contains("invalid_grant") {
                        return Err(ProxyError::Auth(format!(
                            "Refresh token rejected ({}): {}",
                            status, text
                        )));
                    }
                    if status.is_server_error() {
                        last_error =
                            Some(ProxyError::Network(format!("Refresh failed ({}): {}", status, text)));
                        continue;
                    }
                    return Err(ProxyError::Network(format!(
                        "Refresh failed ({}): {}",
                        status, text
                    )));
                }
                Err(e) => {
                    last_error = Some(ProxyError::Network(format!("Refresh transport error: {}", e)));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProxyError::Network("Refresh failed with no response".to_string())))
    }

    ///
    /// Rewrite the credentials file with the current record.
    ///
    /// The file is re-read and only the known keys are overwritten, so any
    /// unrelated fields the Kiro IDE stores there survive the rewrite.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.creds_file else {
            return Ok(());
        };

        let mut file = match Self::read_creds_file(path) {
            Ok(map) => map,
            Err(_) => Map::new(),
        };

        let creds = self.credentials.read().await.clone();
        if let Some(token) = &creds.access_token {
            file.insert("accessToken".to_string(), Value::String(token.clone()));
        }
        file.insert("refreshToken".to_string(), Value::String(creds.refresh_token));
        match creds.expires_at {
            Some(at) => {
                file.insert(
                    "expiresAt".to_string(),
                    Value::String(at.format(EXPIRES_AT_FORMAT).to_string()),
                );
            }
            None => {
                file.remove("expiresAt");
            }
        }
        if let Some(arn) = &creds.profile_arn {
            file.insert("profileArn".to_string(), Value::String(arn.clone()));
        }
        file.insert("region".to_string(), Value::String(self.region.clone()));

        let rendered = serde_json::to_string_pretty(&Value::Object(file))?;
        std::fs::write(path, rendered)
            .map_err(|e| ProxyError::Config(format!("Failed to write credentials file: {}", e)))?;
        Ok(())
    }

    /// Read the credentials file as a flat JSON object.
    fn read_creds_file(path: &PathBuf) -> Result<Map<String, Value>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to parse credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ProxyError::Config(format!(
                "Credentials file {} is not a JSON object",
                path.display()
            ))),
        }
    }

    /// Parse an `expiresAt` timestamp, tolerating any RFC 3339 offset.
    fn parse_expires_at(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
