//!
//! Identifier and fingerprint helpers.
//!
//! Generates the stable machine fingerprint sent to the Kiro upstream and the
//! per-response identifiers used on the OpenAI-compatible surface.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::env;

use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/* --- constants ------------------------------------------------------------------------------ */

/** Salt appended to the host/user pair before hashing */
const FINGERPRINT_SUFFIX: &str = "kiro-gateway";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Compute the machine fingerprint sent in upstream User-Agent headers.
///
/// The fingerprint is the hex SHA-256 digest of `"{hostname}-{username}-kiro-gateway"`.
/// It is deterministic for a given host/user pair and stable across restarts.
///
/// # Returns
///  * 64-character lowercase hex digest
pub fn machine_fingerprint() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let user = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let digest = Sha256::digest(format!("{}-{}-{}", host, user, FINGERPRINT_SUFFIX).as_bytes());
    hex::encode(digest)
}

///
/// Generate a completion identifier in the OpenAI `chatcmpl-` format.
///
/// # Returns
///  * Identifier of the form `chatcmpl-{32 hex chars}`
pub fn completion_id() -> String {
    format!("chatcmpl-{}", random_hex(32))
}

///
/// Generate a tool call identifier in the OpenAI `call_` format.
///
/// # Returns
///  * Identifier of the form `call_{8 hex chars}`
pub fn tool_call_id() -> String {
    format!("call_{}", random_hex(8))
}

///
/// Generate a fresh conversation identifier for an upstream payload.
///
/// # Returns
///  * Random UUID v4 string
pub fn conversation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Produce `len` random lowercase hex characters. `len` must be even.
fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = machine_fingerprint();
        let b = machine_fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_completion_id_format() {
        let id = completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 32);
    }

    #[test]
    fn test_tool_call_id_format() {
        let id = tool_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 8);
    }

    #[test]
    fn test_conversation_id_is_uuid() {
        let id = conversation_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(completion_id(), completion_id());
        assert_ne!(tool_call_id(), tool_call_id());
        assert_ne!(conversation_id(), conversation_id());
    }
}
