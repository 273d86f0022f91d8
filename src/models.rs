//!
//! Model name mapping and model metadata cache.
//!
//! Translates the public Claude model names clients send into the internal
//! identifiers the Kiro upstream expects, and caches per-model metadata
//! (context window, credit cost) behind a wall-clock TTL with a static
//! fallback when the upstream listing is unreachable.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, RwLock};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Metadata for a single upstream model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /** public model identifier */
    pub id: String,
    /** maximum context window in tokens */
    pub max_input_tokens: u32,
    /** credits one request typically consumes; informational */
    pub default_credits_used: f64,
}

///
/// TTL-gated cache of upstream model metadata.
///
/// `update` replaces the whole map atomically; readers never observe a
/// half-populated cache. A separate refill mutex lets concurrent misses
/// coalesce into a single upstream listing call.
pub struct ModelInfoCache {
    /** model id to metadata map plus refresh timestamp */
    state: RwLock<CacheState>,
    /** wall-clock TTL for the map */
    ttl: Duration,
    /** context window served for unknown models */
    default_max_input_tokens: u32,
    /** held for the duration of one refill so misses coalesce */
    refill: Mutex<()>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, ModelInfo>,
    /** None until the first successful upstream refill */
    refreshed_at: Option<Instant>,
}

/* --- start of code -------------------------------------------------------------------------- */

///
/// Map a public model name to the internal Kiro model identifier.
///
/// Exact matches from the mapping table win; names already in internal form
/// pass through; the `auto` alias selects the enhanced sonnet. Unknown names
/// pass through unchanged and are left for the upstream to reject.
///
/// # Arguments
///  * `external` - model name from the client request
///
/// # Returns
///  * Internal model identifier, never fails
pub fn internal_model_id(external: &str) -> String {
    match external {
        "claude-opus-4-5" | "claude-opus-4-5-20251101" | "claude-opus-4.5" => "claude-opus-4.5",
        "claude-haiku-4-5" | "claude-haiku-4.5" => "claude-haiku-4.5",
        "claude-sonnet-4-5" | "claude-sonnet-4-5-20250929" | "CLAUDE_SONNET_4_5_20250929_V1_0" => {
            "CLAUDE_SONNET_4_5_20250929_V1_0"
        }
        "claude-sonnet-4" | "claude-sonnet-4-20250514" | "CLAUDE_SONNET_4_20250514_V1_0" => {
            "CLAUDE_SONNET_4_20250514_V1_0"
        }
        "claude-3-7-sonnet-20250219" | "CLAUDE_3_7_SONNET_20250219_V1_0" => {
            "CLAUDE_3_7_SONNET_20250219_V1_0"
        }
        "auto" => "claude-sonnet-4.5",
        other => return other.to_string(),
    }
    .to_string()
}

///
/// Static model list served when the upstream listing cannot be reached.
///
/// # Returns
///  * Public model records with default metadata
pub fn fallback_models() -> Vec<ModelInfo> {
    [
        "claude-opus-4-5",
        "claude-haiku-4-5",
        "claude-sonnet-4-5",
        "claude-sonnet-4",
        "claude-3-7-sonnet-20250219",
    ]
    .iter()
    .map(|id| ModelInfo {
        id: (*id).to_string(),
        max_input_tokens: 200_000,
        default_credits_used: 1.0,
    })
    .collect()
}

impl ModelInfoCache {
    ///
    /// Create an empty cache.
    ///
    /// # Arguments
    ///  * `ttl` - wall-clock TTL after which the map is considered stale
    ///  * `default_max_input_tokens` - context window for unknown models
    pub fn new(ttl: Duration, default_max_input_tokens: u32) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
            default_max_input_tokens,
            refill: Mutex::new(()),
        }
    }

    ///
    /// Look up metadata for a model.
    ///
    /// # Arguments
    ///  * `model_id` - public model identifier
    ///
    /// # Returns
    ///  * Metadata if the model is known, None otherwise
    pub async fn get(&self, model_id: &str) -> Option<ModelInfo> {
        self.state.read().await.entries.get(model_id).cloned()
    }

    ///
    /// Context window for a model, defaulting when unknown.
    ///
    /// # Arguments
    ///  * `model_id` - public model identifier
    ///
    /// # Returns
    ///  * Known `max_input_tokens` or the configured default
    pub async fn get_max_input_tokens(&self, model_id: &str) -> u32 {
        self.state
            .read()
            .await
            .entries
            .get(model_id)
            .map(|info| info.max_input_tokens)
            .unwrap_or(self.default_max_input_tokens)
    }

    ///
    /// Atomically replace the cache contents and reset the TTL clock.
    ///
    /// # Arguments
    ///  * `records` - fresh model metadata from the upstream listing
    pub async fn update(&self, records: Vec<ModelInfo>) {
        let mut state = self.state.write().await;
        state.entries = records.into_iter().map(|m| (m.id.clone(), m)).collect();
        state.refreshed_at = Some(Instant::now());
    }

    ///
    /// Install the static fallback list without resetting the TTL clock.
    ///
    /// The cache stays stale so the next request attempts a real refill,
    /// but lookups in the meantime are served from the fallback.
    pub async fn update_with_fallback(&self) {
        let mut state = self.state.write().await;
        state.entries = fallback_models().into_iter().map(|m| (m.id.clone(), m)).collect();
    }

    /// True when no records are loaded at all.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// True until a successful refill, and again once the TTL elapses.
    pub async fn is_stale(&self) -> bool {
        match self.state.read().await.refreshed_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    ///
    /// All cached model identifiers, sorted for stable listings.
    pub async fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.read().await.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    ///
    /// Acquire the refill lock.
    ///
    /// The first task to miss performs the upstream listing while holding the
    /// guard; tasks queued behind it re-check staleness after acquisition and
    /// find the cache already fresh.
    pub async fn begin_refill(&self) -> MutexGuard<'_, ()> {
        self.refill.lock().await
    }
}
