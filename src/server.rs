//!
//! HTTP server implementation for the Kiro to OpenAI proxy.
//!
//! Handles incoming OpenAI-compatible requests and routes them to the Kiro
//! upstream. Implements both streaming and non-streaming responses with
//! proper error handling and logging. Follows Dependency Inversion Principle
//! by depending on abstractions.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response, Sse};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::KiroAuthProvider;
use crate::client::KiroClient;
use crate::config::Config;
use crate::converter::kiro_to_openai::ChatCompletionChunk;
use crate::converter::openai_to_kiro::ChatCompletionRequest;
use crate::converter::{OpenAiToKiroConverter, StreamTranscoder, collect_chunks};
use crate::debug::DebugLogger;
use crate::error::{ProxyError, Result};
use crate::models::{ModelInfo, ModelInfoCache, internal_model_id};
use crate::parser::EventStreamParser;
use crate::{ids, VERSION};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application state containing all dependencies.
///
/// Follows Dependency Inversion Principle by depending on abstractions rather
/// than concrete implementations. Contains all services needed for request
/// processing.
pub struct AppState {
    /** application configuration */
    pub config: Config,
    /** authentication provider for Kiro upstream access */
    pub auth: Arc<KiroAuthProvider>,
    /** retry-capable upstream client */
    pub client: KiroClient,
    /** converter from OpenAI requests to Kiro payloads */
    pub converter: OpenAiToKiroConverter,
    /** model metadata cache */
    pub model_cache: ModelInfoCache,
    /** debug dump sink */
    pub debug: DebugLogger,
    /** metrics for monitoring */
    pub metrics: AppMetrics,
}

///
/// Application metrics for monitoring and observability.
///
/// Tracks various operational metrics for monitoring service health.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /** total number of requests processed */
    pub total_requests: AtomicU64,
    /** total number of successful requests */
    pub successful_requests: AtomicU64,
    /** total number of failed requests */
    pub failed_requests: AtomicU64,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Channel buffer size for streaming responses */
const STREAMING_CHANNEL_BUFFER: usize = 100;

/** Bearer token prefix */
const BEARER_PREFIX: &str = "Bearer ";

/* --- start of code -------------------------------------------------------------------------- */

impl AppState {
    ///
    /// Create new application state with all dependencies.
    ///
    /// Initializes the authentication provider, upstream client, converter,
    /// and model cache needed for proxy operation.
    ///
    /// # Arguments
    ///  * `config` - application configuration
    ///
    /// # Returns
    ///  * Application state with initialized dependencies
    ///  * `ProxyError` if initialization fails
    pub fn new(config: Config) -> Result<Self> {
        let auth = Arc::new(KiroAuthProvider::new(&config)?);
        let client = KiroClient::new(auth.clone(), &config)?;
        let converter = OpenAiToKiroConverter::new(config.tool_description_max_length);
        let model_cache = ModelInfoCache::new(
            Duration::from_secs(config.model_cache_ttl),
            config.default_max_input_tokens,
        );
        let debug = DebugLogger::new(config.debug_last_request, config.debug_dir.clone());

        Ok(Self {
            config,
            auth,
            client,
            converter,
            model_cache,
            debug,
            metrics: AppMetrics::default(),
        })
    }
}

///
/// Handle the root endpoint.
///
/// # Returns
///  * JSON status object with the service version
pub async fn root() -> Json<Value> {
    Json(json!({
      "status": "ok",
      "message": "Kiromux OpenAI-compatible gateway",
      "version": VERSION
    }))
}

///
/// Handle the health check endpoint.
///
/// Returns a simple health status for service monitoring with basic metrics.
///
/// # Arguments
///  * `state` - shared application state with metrics
///
/// # Returns
///  * JSON response with health status and metrics
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let total_requests = state.metrics.total_requests.load(Ordering::Relaxed);
    let successful_requests = state.metrics.successful_requests.load(Ordering::Relaxed);
    let failed_requests = state.metrics.failed_requests.load(Ordering::Relaxed);

    Json(json!({
      "status": "ok",
      "timestamp": chrono::Utc::now().to_rfc3339(),
      "version": VERSION,
      "metrics": {
        "total_requests": total_requests,
        "successful_requests": successful_requests,
        "failed_requests": failed_requests
      }
    }))
}

///
/// Handle the models listing endpoint for OpenAI compatibility.
///
/// Serves the cached model list, refilling it from the upstream when stale.
/// Concurrent refills coalesce behind the cache's refill lock; when the
/// upstream listing fails and the cache is empty, the static fallback list
/// is served instead.
///
/// # Arguments
///  * `state` - shared application state
///  * `headers` - request headers carrying the proxy Bearer key
///
/// # Returns
///  * JSON response with the model list, or an error response
pub async fn models(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(e) = check_proxy_auth(&headers, &state.config) {
        return create_error_response(&e);
    }

    ensure_models_fresh(&state).await;

    let created = chrono::Utc::now().timestamp();
    let data: Vec<Value> = state
        .model_cache
        .all_ids()
        .await
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": created,
                "owned_by": "kiro"
            })
        })
        .collect();

    Json(json!({ "object": "list", "data": data })).into_response()
}

///
/// Handle the OpenAI-compatible chat completions endpoint.
///
/// Processes incoming OpenAI format requests, converts them to the Kiro
/// conversation-state format, forwards them upstream, and transcodes the
/// response back to OpenAI format. Supports both streaming and non-streaming
/// responses.
///
/// # Arguments
///  * `state` - shared application state
///  * `headers` - request headers carrying the proxy Bearer key
///  * `request` - OpenAI format request JSON
///
/// # Returns
///  * HTTP response with an OpenAI format completion or error
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    state.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

    match process_chat_completion(state.clone(), &headers, request).await {
        Ok(response) => {
            state.metrics.successful_requests.fetch_add(1, Ordering::Relaxed);
            response
        }
        Err(e) => {
            state.metrics.failed_requests.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Chat completion failed: {}", e);
            create_error_response(&e)
        }
    }
}

///
/// Process a chat completion request end-to-end.
///
/// # Arguments
///  * `state` - shared application state
///  * `headers` - request headers
///  * `request` - raw JSON request
///
/// # Returns
///  * HTTP response on success
///  * `ProxyError` on failure
async fn process_chat_completion(
    state: Arc<AppState>,
    headers: &HeaderMap,
    request: Value,
) -> Result<Response> {
    check_proxy_auth(headers, &state.config)?;

    state.debug.prepare_new_request().await;
    state.debug.log_request_body(&request).await;

    let request = parse_openai_request(request)?;
    log_incoming_request(&request);

    let model_id = internal_model_id(&request.model);
    let max_input_tokens = state.model_cache.get_max_input_tokens(&request.model).await;
    let default_credits_used = state
        .model_cache
        .get(&request.model)
        .await
        .map(|info| info.default_credits_used);

    let payload = state.converter.convert(
        &request,
        &model_id,
        ids::conversation_id(),
        state.auth.profile_arn().await,
    )?;
    let payload = serde_json::to_value(&payload)?;
    state.debug.log_kiro_request_body(&payload).await;

    let upstream_response = state.client.generate_assistant_response(&payload).await?;

    let transcoder = StreamTranscoder::new(&request.model, max_input_tokens, default_credits_used);
    if request.stream.unwrap_or(false) {
        handle_streaming_response(upstream_response, state, transcoder).await
    } else {
        handle_non_streaming_response(upstream_response, state, transcoder, &request.model).await
    }
}

///
/// Verify the proxy Bearer key on a /v1 route.
///
/// # Arguments
///  * `headers` - request headers
///  * `config` - configuration carrying the expected key
///
/// # Returns
///  * `Ok(())` when the key matches
///  * `ProxyError::ProxyAuth` otherwise
fn check_proxy_auth(headers: &HeaderMap, config: &Config) -> Result<()> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProxyError::ProxyAuth("Missing Authorization header".to_string()))?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| ProxyError::ProxyAuth("Authorization header is not a Bearer token".to_string()))?;

    if token != config.proxy_api_key {
        return Err(ProxyError::ProxyAuth("Invalid proxy API key".to_string()));
    }
    Ok(())
}

///
/// Parse an OpenAI request from a JSON value.
///
/// The deserialization error text is sanitized to valid UTF-8 before being
/// surfaced in the 422 response.
///
/// # Arguments
///  * `request` - raw JSON request
///
/// # Returns
///  * Parsed OpenAI request structure
///  * `ProxyError::Validation` if parsing fails
fn parse_openai_request(request: Value) -> Result<ChatCompletionRequest> {
    serde_json::from_value(request).map_err(|e| {
        let message = String::from_utf8_lossy(e.to_string().as_bytes()).into_owned();
        ProxyError::Validation(format!("Invalid request format: {}", message))
    })
}

///
/// Log details about the incoming OpenAI request.
fn log_incoming_request(request: &ChatCompletionRequest) {
    tracing::debug!(
        "Incoming request: model={} messages={} tools={} stream={:?}",
        request.model,
        request.messages.len(),
        request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
        request.stream
    );
}

///
/// Refill the model cache when stale, coalescing concurrent refills.
///
/// The first task to find the cache stale performs the upstream listing under
/// the refill lock; queued tasks re-check afterwards and return immediately.
async fn ensure_models_fresh(state: &Arc<AppState>) {
    if !state.model_cache.is_stale().await {
        return;
    }

    let _guard = state.model_cache.begin_refill().await;
    if !state.model_cache.is_stale().await {
        return;
    }

    match fetch_model_listing(state).await {
        Ok(records) => {
            tracing::info!("Model cache refilled with {} model(s)", records.len());
            state.model_cache.update(records).await;
        }
        Err(e) => {
            tracing::warn!("Model listing failed, serving fallback list: {}", e);
            if state.model_cache.is_empty().await {
                state.model_cache.update_with_fallback().await;
            }
        }
    }
}

///
/// Fetch and parse the upstream model listing.
///
/// The listing format is parsed leniently: each entry needs an id; token
/// limits and credit costs are optional.
async fn fetch_model_listing(state: &Arc<AppState>) -> Result<Vec<ModelInfo>> {
    let response = state.client.list_available_models().await?;
    let body: Value = response.json().await?;

    let entries = body
        .get("models")
        .and_then(Value::as_array)
        .ok_or_else(|| ProxyError::Conversion("Model listing has no 'models' array".to_string()))?;

    let records: Vec<ModelInfo> = entries
        .iter()
        .filter_map(|entry| {
            let id = entry
                .get("modelId")
                .or_else(|| entry.get("id"))
                .and_then(Value::as_str)?;
            let max_input_tokens = entry
                .pointer("/tokenLimits/maxInputTokens")
                .or_else(|| entry.get("maxInputTokens"))
                .and_then(Value::as_u64)
                .unwrap_or(state.config.default_max_input_tokens as u64) as u32;
            let default_credits_used = entry
                .get("creditsUsed")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            Some(ModelInfo {
                id: id.to_string(),
                max_input_tokens,
                default_credits_used,
            })
        })
        .collect();

    if records.is_empty() {
        return Err(ProxyError::Conversion("Model listing was empty".to_string()));
    }
    Ok(records)
}

///
/// Handle a streaming response from the upstream.
///
/// Sets up the parser/transcoder pipeline behind an mpsc channel and returns
/// a Server-Sent Events stream. Each transcoded chunk is flushed as soon as
/// the corresponding upstream event is recovered.
///
/// # Arguments
///  * `response` - streaming HTTP response from the upstream
///  * `state` - application state
///  * `transcoder` - per-response transcoder state
///
/// # Returns
///  * Server-Sent Events response stream
async fn handle_streaming_response(
    response: reqwest::Response,
    state: Arc<AppState>,
    transcoder: StreamTranscoder,
) -> Result<Response> {
    let (tx, rx) = mpsc::channel::<Result<Event>>(STREAMING_CHANNEL_BUFFER);

    tokio::spawn(async move {
        process_streaming_events(response, state, transcoder, tx).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).into_response())
}

///
/// Drive the upstream byte stream through the parser and transcoder.
///
/// A mid-stream failure truncates the stream: whatever was parsed so far is
/// finalized and the terminal `[DONE]` is still sent. A closed channel means
/// the client disconnected; the upstream response is dropped and no retry is
/// attempted.
///
/// # Arguments
///  * `response` - streaming HTTP response
///  * `state` - application state
///  * `transcoder` - per-response transcoder state
///  * `tx` - channel sender for SSE events
async fn process_streaming_events(
    response: reqwest::Response,
    state: Arc<AppState>,
    mut transcoder: StreamTranscoder,
    tx: mpsc::Sender<Result<Event>>,
) {
    let mut parser = EventStreamParser::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(chunk) => {
                state.debug.log_raw_chunk(&chunk).await;
                for event in parser.feed(&chunk) {
                    for rendered in transcoder.on_event(&event) {
                        if !send_chunk(&state, &tx, &rendered).await {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!("Upstream stream error, truncating response: {}", e);
                break;
            }
        }
    }

    for event in parser.finish() {
        for rendered in transcoder.on_event(&event) {
            if !send_chunk(&state, &tx, &rendered).await {
                return;
            }
        }
    }

    send_stream_done(&tx).await;
}

///
/// Serialize and send one chunk downstream.
///
/// # Returns
///  * `false` when the client has disconnected
async fn send_chunk(
    state: &Arc<AppState>,
    tx: &mpsc::Sender<Result<Event>>,
    chunk: &ChatCompletionChunk,
) -> bool {
    match serde_json::to_string(chunk) {
        Ok(rendered) => {
            state
                .debug
                .log_modified_chunk(&format!("data: {}\n\n", rendered))
                .await;
            tx.send(Ok(Event::default().data(rendered))).await.is_ok()
        }
        Err(e) => {
            tracing::error!("Failed to serialize chunk: {}", e);
            true
        }
    }
}

///
/// Send the final [DONE] event to complete the stream.
///
/// # Arguments
///  * `tx` - event sender channel
async fn send_stream_done(tx: &mpsc::Sender<Result<Event>>) {
    let _ = tx.send(Ok(Event::default().data("[DONE]"))).await;
}

///
/// Handle a non-streaming response from the upstream.
///
/// Runs the same parser/transcoder pipeline over the complete body and
/// reduces the chunk sequence to a single completion object.
///
/// # Arguments
///  * `response` - HTTP response from the upstream
///  * `state` - application state
///  * `transcoder` - per-response transcoder state
///  * `model` - model name echoed back to the client
///
/// # Returns
///  * OpenAI format JSON response
///  * `ProxyError` if reading the body fails
async fn handle_non_streaming_response(
    response: reqwest::Response,
    state: Arc<AppState>,
    mut transcoder: StreamTranscoder,
    model: &str,
) -> Result<Response> {
    let body = response.bytes().await.map_err(ProxyError::Request)?;
    state.debug.log_raw_chunk(&body).await;

    let mut parser = EventStreamParser::new();
    let mut chunks = Vec::new();
    for event in parser.feed(&body) {
        chunks.extend(transcoder.on_event(&event));
    }
    for event in parser.finish() {
        chunks.extend(transcoder.on_event(&event));
    }

    let completion = collect_chunks(&chunks, model);
    Ok(Json(completion).into_response())
}

///
/// Create an error response for client errors.
///
/// # Arguments
///  * `error` - error to convert to an HTTP response
///
/// # Returns
///  * HTTP error response with JSON error details
pub fn create_error_response(error: &ProxyError) -> Response {
    use axum::http::StatusCode;

    let (status_code, error_type) = match error {
        ProxyError::ProxyAuth(_) | ProxyError::Auth(_) => {
            (StatusCode::UNAUTHORIZED, "authentication_error")
        }
        ProxyError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request_error"),
        ProxyError::Config(_) | ProxyError::Conversion(_) => {
            (StatusCode::BAD_REQUEST, "invalid_request_error")
        }
        ProxyError::Upstream { .. } | ProxyError::Network(_) => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
        ProxyError::UpstreamUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        ProxyError::Request(e) if e.is_timeout() => {
            (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    let error_response = json!({
      "error": {
        "message": error.to_string(),
        "type": error_type,
        "code": status_code.as_u16()
      }
    });

    (status_code, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use axum::http::HeaderValue;

    #[test]
    fn test_proxy_auth_accepts_matching_key() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer test-proxy-key"));
        assert!(check_proxy_auth(&headers, &config).is_ok());
    }

    #[test]
    fn test_proxy_auth_rejects_missing_header() {
        let config = test_config();
        let headers = HeaderMap::new();
        assert!(matches!(
            check_proxy_auth(&headers, &config),
            Err(ProxyError::ProxyAuth(_))
        ));
    }

    #[test]
    fn test_proxy_auth_rejects_wrong_key() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(matches!(
            check_proxy_auth(&headers, &config),
            Err(ProxyError::ProxyAuth(_))
        ));
    }

    #[test]
    fn test_proxy_auth_rejects_non_bearer() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert!(matches!(
            check_proxy_auth(&headers, &config),
            Err(ProxyError::ProxyAuth(_))
        ));
    }

    #[test]
    fn test_parse_request_rejects_bad_shape() {
        let result = parse_openai_request(json!({"model": 42}));
        assert!(matches!(result, Err(ProxyError::Validation(_))));
    }

    #[test]
    fn test_parse_request_accepts_minimal() {
        let request = parse_openai_request(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": "Hi"}]
        }))
        .unwrap();
        assert_eq!(request.model, "claude-sonnet-4-5");
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_error_response_status_mapping() {
        let cases: Vec<(ProxyError, u16)> = vec![
            (ProxyError::ProxyAuth("x".to_string()), 401),
            (ProxyError::Auth("x".to_string()), 401),
            (ProxyError::Validation("x".to_string()), 422),
            (
                ProxyError::Upstream {
                    status: 400,
                    body: "x".to_string(),
                },
                502,
            ),
            (ProxyError::UpstreamUnavailable { attempts: 3 }, 503),
        ];
        for (error, expected) in cases {
            let response = create_error_response(&error);
            assert_eq!(response.status().as_u16(), expected, "for {:?}", error);
        }
    }
}
