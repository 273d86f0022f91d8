//!
//! Retry-capable HTTP client for the Kiro upstream.
//!
//! Classifies upstream failures and applies exponential backoff, coordinating
//! with the authentication provider on 403 rejections: the first auth failure
//! triggers one forced token refresh before the request is retried; a second
//! one is surfaced as a permanent upstream error.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::KiroAuthProvider;
use crate::config::Config;
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// HTTP client for upstream calls with retry policy.
///
/// The request body is buffered JSON, so every retry re-sends the same
/// payload. Retries are only attempted before any response byte has been
/// handed to the transcoder; once streaming has begun, mid-stream failures
/// surface as truncated streams.
pub struct KiroClient {
    /** long-timeout client; the upstream streams slowly */
    http: reqwest::Client,
    /** authentication provider shared across requests */
    auth: Arc<KiroAuthProvider>,
    /** maximum attempts for transient failures */
    max_retries: u32,
    /** base delay for exponential backoff */
    base_retry_delay: Duration,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Connect timeout for upstream calls */
const CONNECT_TIMEOUT_SECS: u64 = 10;

/** SDK identification reported to the upstream */
const SDK_VERSION: &str = "aws-sdk-js/1.0.27";

/** Client identification reported to the upstream */
const CLIENT_VERSION: &str = "KiroIDE-0.7.45";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Build the header set for one upstream call.
///
/// The User-Agent pair carries the machine fingerprint; the invocation id is
/// a fresh UUID per call.
///
/// # Arguments
///  * `token` - bearer access token
///  * `fingerprint` - machine fingerprint
///
/// # Returns
///  * Header map for the request
pub fn kiro_headers(token: &str, fingerprint: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
        headers.insert(AUTHORIZATION, value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let ua = format!(
        "{} ua/2.1 api/codewhispererstreaming#1.0.27 m/E {}-{}",
        SDK_VERSION, CLIENT_VERSION, fingerprint
    );
    if let Ok(value) = HeaderValue::from_str(&ua) {
        headers.insert(USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{} {}-{}", SDK_VERSION, CLIENT_VERSION, fingerprint)) {
        headers.insert("x-amz-user-agent", value);
    }
    if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        headers.insert("amz-sdk-invocation-id", value);
    }
    headers.insert("amz-sdk-request", HeaderValue::from_static("attempt=1; max=3"));

    headers
}

impl KiroClient {
    ///
    /// Create a new upstream client.
    ///
    /// # Arguments
    ///  * `auth` - shared authentication provider
    ///  * `config` - application configuration
    ///
    /// # Returns
    ///  * Configured client
    ///  * `ProxyError::Network` if client construction fails
    pub fn new(auth: Arc<KiroAuthProvider>, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProxyError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            auth,
            max_retries: config.max_retries.max(1),
            base_retry_delay: Duration::from_secs_f64(config.base_retry_delay.max(0.0)),
        })
    }

    ///
    /// POST a generation payload to the upstream.
    ///
    /// The returned response body is the upstream event-stream; feed it to
    /// the event-stream parser.
    ///
    /// # Arguments
    ///  * `payload` - serialized conversation state
    ///
    /// # Returns
    ///  * Successful upstream response
    ///  * Classified `ProxyError` otherwise
    pub async fn generate_assistant_response(&self, payload: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/generateAssistantResponse", self.auth.api_host());
        self.request_with_retry(Method::POST, &url, Some(payload)).await
    }

    ///
    /// Fetch the upstream model listing.
    ///
    /// # Returns
    ///  * Successful upstream response with the model list JSON
    ///  * Classified `ProxyError` otherwise
    pub async fn list_available_models(&self) -> Result<reqwest::Response> {
        let url = format!("{}/ListAvailableModels", self.auth.q_host());
        self.request_with_retry(Method::GET, &url, None).await
    }

    ///
    /// Issue one request with the retry policy applied.
    ///
    /// Policy:
    ///  * 403: one forced token refresh, then retry; a second 403 is permanent
    ///  * 429 / 5xx / connect-or-read timeout: exponential backoff
    ///    (`base * 2^attempt`), up to `max_retries` attempts total
    ///  * other 4xx: no retry, upstream body echoed in the error
    ///
    /// # Arguments
    ///  * `method` - HTTP method
    ///  * `url` - absolute URL
    ///  * `body` - buffered JSON body, re-sent on every attempt
    ///
    /// # Returns
    ///  * First successful response
    ///  * `ProxyError::UpstreamUnavailable` after exhausting retries
    async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut refreshed_on_auth = false;

        for attempt in 0..self.max_retries {
            let token = self.auth.access_token().await?;

            let mut request = self
                .http
                .request(method.clone(), url)
                .headers(kiro_headers(&token, self.auth.fingerprint()));
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 403 && !refreshed_on_auth {
                        tracing::warn!(
                            "Upstream returned 403 (attempt {}/{}), forcing token refresh",
                            attempt + 1,
                            self.max_retries
                        );
                        refreshed_on_auth = true;
                        self.auth.force_refresh().await?;
                        continue;
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        if attempt + 1 >= self.max_retries {
                            tracing::error!(
                                "Upstream still failing ({}) after {} attempts: {}",
                                status,
                                self.max_retries,
                                body_text
                            );
                            break;
                        }
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            "Upstream transient failure ({}), retrying in {:?} (attempt {}/{})",
                            status,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(ProxyError::Upstream {
                        status: status.as_u16(),
                        body: body_text,
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt + 1 >= self.max_retries {
                        tracing::error!(
                            "Upstream unreachable after {} attempts: {}",
                            self.max_retries,
                            e
                        );
                        break;
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "Upstream transport failure ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProxyError::UpstreamUnavailable {
            attempts: self.max_retries,
        })
    }

    /// Backoff delay for a zero-based attempt number: `base * 2^attempt`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_retry_delay * 2u32.saturating_pow(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_backoff_sequence() {
        let auth = Arc::new(KiroAuthProvider::new(&test_config()).unwrap());
        let client = KiroClient::new(auth, &test_config()).unwrap();
        assert_eq!(client.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(client.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(client.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_headers_carry_bearer_and_fingerprint() {
        let headers = kiro_headers("token-abc", "fp-123");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer token-abc");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("fp-123"));
        assert!(headers.get("amz-sdk-invocation-id").is_some());
    }

    #[test]
    fn test_invocation_id_is_fresh_per_call() {
        let first = kiro_headers("t", "f");
        let second = kiro_headers("t", "f");
        assert_ne!(
            first.get("amz-sdk-invocation-id").unwrap(),
            second.get("amz-sdk-invocation-id").unwrap()
        );
    }
}
