//!
//! Format conversion modules for OpenAI and Kiro API compatibility.
//!
//! Handles bidirectional conversion between the OpenAI chat completions
//! format and the Kiro conversation-state format. Each converter follows
//! Single Responsibility Principle and focuses on a specific conversion
//! direction.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod kiro_to_openai;
pub mod openai_to_kiro;

/* --- start of code -------------------------------------------------------------------------- */

pub use kiro_to_openai::{collect_chunks, StreamTranscoder};
pub use openai_to_kiro::OpenAiToKiroConverter;
