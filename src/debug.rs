//!
//! Debug dumps of the last request and its streams.
//!
//! When enabled, the inbound request body, the converted upstream payload,
//! and the raw/transcoded stream chunks of the most recent request are
//! written to the debug directory. All writes for one request are serialized
//! behind a process-wide lock so dumps from concurrent requests do not
//! interleave; debug mode is not meant for production traffic.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::Mutex;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Debug dump sink for the most recent request.
///
/// Every method is a no-op when debug mode is disabled. Write failures are
/// logged and swallowed; dumps never fail a request.
pub struct DebugLogger {
    /** debug mode switch */
    enabled: bool,
    /** directory receiving the dump files */
    dir: PathBuf,
    /** serializes all dump writes process-wide */
    lock: Mutex<()>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Inbound OpenAI request body */
const REQUEST_BODY_FILE: &str = "request_body.json";

/** Converted upstream payload */
const KIRO_REQUEST_BODY_FILE: &str = "kiro_request_body.json";

/** Raw upstream stream bytes, appended chunk by chunk */
const RAW_STREAM_FILE: &str = "response_stream_raw.txt";

/** Transcoded SSE lines, appended chunk by chunk */
const MODIFIED_STREAM_FILE: &str = "response_stream_modified.txt";

/* --- start of code -------------------------------------------------------------------------- */

impl DebugLogger {
    ///
    /// Create a debug logger.
    ///
    /// # Arguments
    ///  * `enabled` - whether dumps are written at all
    ///  * `dir` - target directory, created on first use
    pub fn new(enabled: bool, dir: PathBuf) -> Self {
        Self {
            enabled,
            dir,
            lock: Mutex::new(()),
        }
    }

    ///
    /// Start a new dump: create the directory and truncate all dump files.
    pub async fn prepare_new_request(&self) {
        if !self.enabled {
            return;
        }
        let _guard = self.lock.lock().await;
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Failed to create debug directory {}: {}", self.dir.display(), e);
            return;
        }
        for file in [
            REQUEST_BODY_FILE,
            KIRO_REQUEST_BODY_FILE,
            RAW_STREAM_FILE,
            MODIFIED_STREAM_FILE,
        ] {
            if let Err(e) = std::fs::write(self.dir.join(file), b"") {
                tracing::warn!("Failed to truncate debug file {}: {}", file, e);
            }
        }
    }

    /// Dump the inbound OpenAI request body.
    pub async fn log_request_body(&self, body: &Value) {
        self.write_json(REQUEST_BODY_FILE, body).await;
    }

    /// Dump the converted upstream payload.
    pub async fn log_kiro_request_body(&self, body: &Value) {
        self.write_json(KIRO_REQUEST_BODY_FILE, body).await;
    }

    /// Append one raw upstream chunk, lossily decoded.
    pub async fn log_raw_chunk(&self, chunk: &[u8]) {
        if !self.enabled {
            return;
        }
        let text = String::from_utf8_lossy(chunk).into_owned();
        self.append(RAW_STREAM_FILE, &text).await;
    }

    /// Append one transcoded SSE line.
    pub async fn log_modified_chunk(&self, line: &str) {
        if !self.enabled {
            return;
        }
        self.append(MODIFIED_STREAM_FILE, line).await;
    }

    async fn write_json(&self, file: &str, body: &Value) {
        if !self.enabled {
            return;
        }
        let _guard = self.lock.lock().await;
        let rendered = serde_json::to_string_pretty(body).unwrap_or_default();
        if let Err(e) = std::fs::write(self.dir.join(file), rendered) {
            tracing::warn!("Failed to write debug file {}: {}", file, e);
        }
    }

    async fn append(&self, file: &str, text: &str) {
        let _guard = self.lock.lock().await;
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .and_then(|mut f| f.write_all(text.as_bytes()));
        if let Err(e) = result {
            tracing::warn!("Failed to append debug file {}: {}", file, e);
        }
    }
}
