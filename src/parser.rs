//!
//! Event-stream parser for the Kiro upstream response format.
//!
//! The upstream streams AWS event-stream frames whose payloads are JSON
//! objects carrying text deltas, tool-use fragments, and usage metadata. The
//! parser treats the byte stream as a sliding UTF-8 window, recovers complete
//! JSON objects behind known payload prefixes, and classifies them into typed
//! events for the transcoder. It also extracts bracket-style inline tool
//! calls (`[Called name with args: {...}]`) from the accumulated text once
//! the stream ends.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::ids;

/* --- types ----------------------------------------------------------------------------------- */

///
/// One event recovered from the upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /** text delta with escape sequences already decoded */
    Content { text: String },
    /** a tool call opened */
    ToolStart { id: String, name: String },
    /** a fragment of the tool call's JSON input */
    ToolInput { id: String, text: String },
    /** the tool call's input is complete */
    ToolStop { id: String },
    /** context window consumption report, 0-100 */
    ContextUsage { percent: f64 },
    /** credit cost report, terminal informational */
    Usage { credits: f64 },
    /** stream closed cleanly */
    End,
}

///
/// Stateful parser over one upstream response.
///
/// Feed it raw byte chunks as they arrive; it yields events as soon as
/// complete payloads are recovered and keeps partial payloads buffered.
/// Call `finish` exactly once after the last chunk to run the bracket-style
/// tool-call scan and obtain the terminal `End` event.
pub struct EventStreamParser {
    /** sliding text window of undecoded input */
    buffer: String,
    /** hash of the last emitted content delta, for adjacent dedup */
    last_text_hash: Option<u64>,
    /** tool call currently receiving input fragments */
    current_tool_id: Option<String>,
    /** open tool calls by id */
    open_tools: HashMap<String, PartialToolCall>,
    /** tool calls whose input completed, in arrival order */
    completed_tools: Vec<CompletedToolCall>,
    /** full plain-text transcript for the post-hoc bracket scan */
    transcript: String,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    name: String,
    input_fragments: String,
}

#[derive(Debug)]
struct CompletedToolCall {
    name: String,
    input: Value,
}

///
/// A bracket-style tool call recovered from plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketToolCall {
    /** tool name between `[Called` and the colon */
    pub name: String,
    /** parsed JSON arguments */
    pub input: Value,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Known payload prefixes; anything else between frames is binary noise */
const PAYLOAD_PREFIXES: &[&str] = &[
    "{\"content\":",
    "{\"name\":",
    "{\"input\":",
    "{\"stop\":",
    "{\"followupPrompt\":",
    "{\"usage\":",
    "{\"contextUsagePercentage\":",
];

/** Marker opening a bracket-style inline tool call */
const BRACKET_CALL_PREFIX: &str = "[Called ";

/** Optional suffix between the tool name and the argument colon */
const BRACKET_ARGS_SUFFIX: &str = " with args";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Find the closing brace matching the opening brace at `start`.
///
/// Scans forward maintaining a depth counter while tracking whether the
/// cursor is inside a string literal; quotes preceded by a backslash do not
/// toggle the string state, and nested braces inside strings are ignored.
///
/// # Arguments
///  * `text` - text to scan
///  * `start` - byte index of an opening `{`
///
/// # Returns
///  * Byte index of the matching `}`, or None if the region is incomplete
pub fn find_matching_brace(text: &str, start: usize) -> Option<usize> {
    let region = text.get(start..)?;
    if !region.starts_with('{') {
        return None;
    }

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in region.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

///
/// Drop tool calls that duplicate an earlier one.
///
/// Two calls are duplicates when both the name and the canonical rendering of
/// the input match. The first occurrence wins, so a structured `toolUse`
/// suppresses a bracket-style repeat of the same call.
///
/// # Arguments
///  * `calls` - tool calls in arrival order
///
/// # Returns
///  * Calls with duplicates removed, order preserved
pub fn deduplicate_tool_calls(calls: Vec<BracketToolCall>) -> Vec<BracketToolCall> {
    let mut seen = std::collections::HashSet::new();
    calls
        .into_iter()
        .filter(|call| seen.insert(tool_call_key(&call.name, &call.input)))
        .collect()
}

/// Canonical dedup key for a tool call. serde_json renders object keys in
/// sorted order, so equal inputs produce equal keys regardless of source.
fn tool_call_key(name: &str, input: &Value) -> String {
    format!("{}\u{0}{}", name, input)
}

///
/// Extract bracket-style tool calls from plain text.
///
/// Recognizes `[Called name: {json}]` and `[Called name with args: {json}]`
/// with brace-balanced arguments. Matched regions are removed from the
/// returned text; anything that fails to parse as a call is left untouched.
///
/// # Arguments
///  * `text` - accumulated plain-text content
///
/// # Returns
///  * Tuple of (recovered calls in order, text with matched regions removed)
pub fn parse_bracket_tool_calls(text: &str) -> (Vec<BracketToolCall>, String) {
    let mut calls = Vec::new();
    let mut cleaned = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(BRACKET_CALL_PREFIX) {
        let call_start = cursor + rel;
        match parse_one_bracket_call(text, call_start) {
            Some((call, end)) => {
                cleaned.push_str(&text[cursor..call_start]);
                calls.push(call);
                cursor = end;
            }
            None => {
                // Not a well-formed call; keep the marker as literal text.
                let keep_to = call_start + BRACKET_CALL_PREFIX.len();
                cleaned.push_str(&text[cursor..keep_to]);
                cursor = keep_to;
            }
        }
    }
    cleaned.push_str(&text[cursor..]);

    (calls, cleaned)
}

///
/// Try to parse one bracket call starting at `start` (which points at `[`).
///
/// # Returns
///  * The call and the byte index just past the closing `]`, or None
fn parse_one_bracket_call(text: &str, start: usize) -> Option<(BracketToolCall, usize)> {
    let head_start = start + BRACKET_CALL_PREFIX.len();
    let colon_rel = text[head_start..].find(':')?;
    let mut name = text[head_start..head_start + colon_rel].trim();
    if let Some(stripped) = name.strip_suffix(BRACKET_ARGS_SUFFIX) {
        name = stripped.trim_end();
    }
    if name.is_empty() || name.contains(['\n', '[', ']']) {
        return None;
    }

    let after_colon = head_start + colon_rel + 1;
    let brace_rel = text[after_colon..].find(|c: char| !c.is_whitespace())?;
    let brace_start = after_colon + brace_rel;
    if !text[brace_start..].starts_with('{') {
        return None;
    }

    let brace_end = find_matching_brace(text, brace_start)?;
    if !text[brace_end + 1..].starts_with(']') {
        return None;
    }

    let input: Value = serde_json::from_str(&text[brace_start..=brace_end]).ok()?;
    Some((
        BracketToolCall {
            name: name.to_string(),
            input,
        },
        brace_end + 2,
    ))
}

impl EventStreamParser {
    ///
    /// Create a parser for one upstream response.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            last_text_hash: None,
            current_tool_id: None,
            open_tools: HashMap::new(),
            completed_tools: Vec::new(),
            transcript: String::new(),
        }
    }

    ///
    /// Feed one received byte chunk and drain all newly complete events.
    ///
    /// Invalid UTF-8 (binary frame headers) is dropped from the window;
    /// partial payloads at the buffer end stay buffered for the next chunk.
    ///
    /// # Arguments
    ///  * `chunk` - raw bytes from the upstream response body
    ///
    /// # Returns
    ///  * Events recovered from the buffer, in stream order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        loop {
            let Some(start) = self.earliest_payload_start() else {
                self.trim_noise();
                break;
            };

            // Binary noise before a recognized prefix is discarded.
            if start > 0 {
                self.buffer.drain(..start);
            }

            let Some(end) = find_matching_brace(&self.buffer, 0) else {
                // Incomplete payload; wait for more bytes.
                break;
            };

            let payload: String = self.buffer.drain(..=end).collect();
            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => {
                    if let Some(event) = self.classify(value) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    tracing::debug!("Skipping unparseable payload ({}): {}", e, payload);
                }
            }
        }

        events
    }

    ///
    /// Finish the stream: run the bracket-style scan and emit the terminal events.
    ///
    /// Bracket calls found in the transcript are emitted as synthesized
    /// ToolStart/ToolInput/ToolStop triples, after dropping any that duplicate
    /// a structured call already seen. The final event is always `End`.
    ///
    /// # Returns
    ///  * Synthesized tool-call events followed by `End`
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        // Close any tool call the upstream never stopped explicitly.
        if let Some(id) = self.current_tool_id.take() {
            self.complete_tool(&id);
        }

        let (bracket_calls, cleaned) = parse_bracket_tool_calls(&self.transcript);
        self.transcript = cleaned;

        let mut seen: std::collections::HashSet<String> = self
            .completed_tools
            .iter()
            .map(|tool| tool_call_key(&tool.name, &tool.input))
            .collect();

        let mut events = Vec::new();
        for call in deduplicate_tool_calls(bracket_calls) {
            if !seen.insert(tool_call_key(&call.name, &call.input)) {
                continue;
            }
            let id = ids::tool_call_id();
            events.push(StreamEvent::ToolStart {
                id: id.clone(),
                name: call.name,
            });
            events.push(StreamEvent::ToolInput {
                id: id.clone(),
                text: call.input.to_string(),
            });
            events.push(StreamEvent::ToolStop { id });
        }

        events.push(StreamEvent::End);
        events
    }

    /// Plain-text transcript with bracket-call regions removed (after `finish`).
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    ///
    /// Byte offset of the earliest known payload prefix in the buffer.
    fn earliest_payload_start(&self) -> Option<usize> {
        PAYLOAD_PREFIXES
            .iter()
            .filter_map(|prefix| self.buffer.find(prefix))
            .min()
    }

    ///
    /// Discard buffered noise while keeping any tail that could still grow
    /// into a recognized prefix.
    fn trim_noise(&mut self) {
        let keep_from = (0..self.buffer.len())
            .rev()
            .take(PAYLOAD_PREFIXES.iter().map(|p| p.len()).max().unwrap_or(0))
            .find(|&i| {
                self.buffer.is_char_boundary(i)
                    && PAYLOAD_PREFIXES
                        .iter()
                        .any(|prefix| prefix.starts_with(&self.buffer[i..]))
            });
        match keep_from {
            Some(i) => {
                self.buffer.drain(..i);
            }
            None => self.buffer.clear(),
        }
    }

    ///
    /// Classify one recovered JSON payload into an event.
    ///
    /// Input fragments are checked before tool starts because fragment
    /// payloads may also carry `name` and `toolUseId`.
    fn classify(&mut self, value: Value) -> Option<StreamEvent> {
        if value.get("followupPrompt").is_some() {
            return None;
        }

        if value.get("stop").and_then(Value::as_bool).unwrap_or(false) {
            let id = value
                .get("toolUseId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| self.current_tool_id.clone())?;
            self.current_tool_id = None;
            self.complete_tool(&id);
            self.last_text_hash = None;
            return Some(StreamEvent::ToolStop { id });
        }

        if let Some(usage) = value.get("usage") {
            let credits = usage
                .as_f64()
                .or_else(|| usage.get("creditsUsed").and_then(Value::as_f64))?;
            self.last_text_hash = None;
            return Some(StreamEvent::Usage {
                credits: credits.max(0.0),
            });
        }

        if let Some(percent) = value.get("contextUsagePercentage").and_then(Value::as_f64) {
            self.last_text_hash = None;
            return Some(StreamEvent::ContextUsage {
                percent: percent.clamp(0.0, 100.0),
            });
        }

        if let Some(input) = value.get("input").and_then(Value::as_str) {
            let id = value
                .get("toolUseId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| self.current_tool_id.clone())?;
            self.open_tools
                .entry(id.clone())
                .or_default()
                .input_fragments
                .push_str(input);
            self.last_text_hash = None;
            return Some(StreamEvent::ToolInput {
                id,
                text: input.to_string(),
            });
        }

        if let (Some(name), Some(id)) = (
            value.get("name").and_then(Value::as_str),
            value.get("toolUseId").and_then(Value::as_str),
        ) {
            self.current_tool_id = Some(id.to_string());
            let entry = self.open_tools.entry(id.to_string()).or_default();
            entry.name = name.to_string();
            self.last_text_hash = None;
            return Some(StreamEvent::ToolStart {
                id: id.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(text) = value.get("content").and_then(Value::as_str) {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            let hash = hasher.finish();
            if self.last_text_hash == Some(hash) {
                // Adjacent duplicate delta; the upstream repeats frames.
                return None;
            }
            self.last_text_hash = Some(hash);
            self.transcript.push_str(text);
            return Some(StreamEvent::Content {
                text: text.to_string(),
            });
        }

        None
    }

    ///
    /// Move an open tool call to the completed list, parsing its input.
    fn complete_tool(&mut self, id: &str) {
        if let Some(partial) = self.open_tools.remove(id) {
            let input = serde_json::from_str(&partial.input_fragments)
                .unwrap_or_else(|_| Value::Object(Default::default()));
            self.completed_tools.push(CompletedToolCall {
                name: partial.name,
                input,
            });
        }
    }
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /* --- find_matching_brace ------------------------------------------------------------ */

    #[test]
    fn test_brace_matching_flat() {
        assert_eq!(find_matching_brace("{}", 0), Some(1));
        assert_eq!(find_matching_brace(r#"{"a":1}"#, 0), Some(6));
    }

    #[test]
    fn test_brace_matching_nested() {
        let text = r#"{"a":{"b":{"c":1}}}tail"#;
        assert_eq!(find_matching_brace(text, 0), Some(18));
    }

    #[test]
    fn test_brace_matching_brace_inside_string() {
        let text = r#"{"a":"}}}"}"#;
        assert_eq!(find_matching_brace(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_brace_matching_escaped_quote() {
        let text = r#"{"a":"he said \"}\" loudly"}"#;
        assert_eq!(find_matching_brace(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_brace_matching_incomplete() {
        assert_eq!(find_matching_brace(r#"{"a":{"b":1}"#, 0), None);
        assert_eq!(find_matching_brace("{", 0), None);
    }

    #[test]
    fn test_brace_matching_at_offset() {
        let text = r#"noise{"a":1}more"#;
        assert_eq!(find_matching_brace(text, 5), Some(11));
    }

    #[test]
    fn test_brace_matching_not_a_brace() {
        assert_eq!(find_matching_brace("abc", 0), None);
    }

    /* --- event extraction ---------------------------------------------------------------- */

    #[test]
    fn test_content_event() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"content":"Hello"}"#);
        assert_eq!(
            events,
            vec![StreamEvent::Content {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_content_escapes_decoded() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"content":"line1\nline2 \"quoted\""}"#);
        assert_eq!(
            events,
            vec![StreamEvent::Content {
                text: "line1\nline2 \"quoted\"".to_string()
            }]
        );
    }

    #[test]
    fn test_partial_payload_across_chunks() {
        let mut parser = EventStreamParser::new();
        assert!(parser.feed(br#"{"content":"Hel"#).is_empty());
        let events = parser.feed(br#"lo"}"#);
        assert_eq!(
            events,
            vec![StreamEvent::Content {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_binary_noise_between_payloads() {
        let mut parser = EventStreamParser::new();
        let mut bytes = vec![0x00, 0x00, 0x01, 0xff, 0xfe];
        bytes.extend_from_slice(br#"{"content":"a"}"#);
        bytes.extend_from_slice(&[0x83, 0x00]);
        bytes.extend_from_slice(br#"{"content":"b"}"#);
        let events = parser.feed(&bytes);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_adjacent_duplicate_content_dropped() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"content":"dup"}{"content":"dup"}{"content":"dup"}"#);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_duplicate_content_separated_by_event_kept() {
        let mut parser = EventStreamParser::new();
        let events =
            parser.feed(br#"{"content":"dup"}{"contextUsagePercentage":12.5}{"content":"dup"}"#);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], StreamEvent::Content { .. }));
    }

    #[test]
    fn test_tool_call_sequence() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(
            br#"{"name":"get_weather","toolUseId":"u1"}{"input":"{\"loc\":","toolUseId":"u1"}{"input":"\"NYC\"}","toolUseId":"u1"}{"stop":true,"toolUseId":"u1"}"#,
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::ToolStart {
                    id: "u1".to_string(),
                    name: "get_weather".to_string()
                },
                StreamEvent::ToolInput {
                    id: "u1".to_string(),
                    text: "{\"loc\":".to_string()
                },
                StreamEvent::ToolInput {
                    id: "u1".to_string(),
                    text: "\"NYC\"}".to_string()
                },
                StreamEvent::ToolStop {
                    id: "u1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tool_input_without_id_uses_current_tool() {
        let mut parser = EventStreamParser::new();
        let events =
            parser.feed(br#"{"name":"bash","toolUseId":"t9"}{"input":"{}"}{"stop":true}"#);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            StreamEvent::ToolInput {
                id: "t9".to_string(),
                text: "{}".to_string()
            }
        );
        assert_eq!(
            events[2],
            StreamEvent::ToolStop {
                id: "t9".to_string()
            }
        );
    }

    #[test]
    fn test_usage_and_context_events() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"contextUsagePercentage":42.0}{"usage":1.5}"#);
        assert_eq!(
            events,
            vec![
                StreamEvent::ContextUsage { percent: 42.0 },
                StreamEvent::Usage { credits: 1.5 },
            ]
        );
    }

    #[test]
    fn test_usage_object_form() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"usage":{"creditsUsed":0.25}}"#);
        assert_eq!(events, vec![StreamEvent::Usage { credits: 0.25 }]);
    }

    #[test]
    fn test_followup_prompt_ignored() {
        let mut parser = EventStreamParser::new();
        let events = parser.feed(br#"{"followupPrompt":{"content":"anything else?"}}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_emits_end() {
        let mut parser = EventStreamParser::new();
        parser.feed(br#"{"content":"hi"}"#);
        let events = parser.finish();
        assert_eq!(events, vec![StreamEvent::End]);
    }

    /* --- bracket-style tool calls -------------------------------------------------------- */

    #[test]
    fn test_bracket_call_with_args() {
        let (calls, cleaned) =
            parse_bracket_tool_calls(r#"before [Called get_weather with args: {"loc":"NYC"}] after"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].input, json!({"loc":"NYC"}));
        assert_eq!(cleaned, "before  after");
    }

    #[test]
    fn test_bracket_call_without_args_keyword() {
        let (calls, _) = parse_bracket_tool_calls(r#"[Called search: {"q":"rust"}]"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
    }

    #[test]
    fn test_bracket_call_nested_braces() {
        let (calls, cleaned) =
            parse_bracket_tool_calls(r#"[Called run: {"cmd":"ls","env":{"A":"}b{"}}]"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input["env"]["A"], "}b{");
        assert_eq!(cleaned, "");
    }

    #[test]
    fn test_bracket_call_malformed_left_alone() {
        let text = "[Called not really a call] and [Called broken: {\"a\":1 ...";
        let (calls, cleaned) = parse_bracket_tool_calls(text);
        assert!(calls.is_empty());
        assert_eq!(cleaned, text);
    }

    #[test]
    fn test_finish_synthesizes_bracket_calls() {
        let mut parser = EventStreamParser::new();
        parser.feed(br#"{"content":"I will check. [Called get_weather with args: {\"loc\":\"NYC\"}]"}"#);
        let events = parser.finish();

        // ToolStart, ToolInput, ToolStop, End
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StreamEvent::ToolStart { ref name, .. } if name == "get_weather"));
        assert!(matches!(events[1], StreamEvent::ToolInput { .. }));
        assert!(matches!(events[2], StreamEvent::ToolStop { .. }));
        assert_eq!(events[3], StreamEvent::End);
        assert_eq!(parser.transcript(), "I will check. ");
    }

    #[test]
    fn test_bracket_duplicate_of_structured_call_dropped() {
        let mut parser = EventStreamParser::new();
        parser.feed(
            br#"{"name":"get_weather","toolUseId":"u1"}{"input":"{\"loc\":\"NYC\"}","toolUseId":"u1"}{"stop":true,"toolUseId":"u1"}"#,
        );
        parser.feed(br#"{"content":"[Called get_weather with args: {\"loc\":\"NYC\"}]"}"#);
        let events = parser.finish();
        // The bracket call repeats the structured one, so only End remains.
        assert_eq!(events, vec![StreamEvent::End]);
    }

    #[test]
    fn test_deduplicate_tool_calls_keeps_first() {
        let calls = vec![
            BracketToolCall {
                name: "a".to_string(),
                input: json!({"x":1}),
            },
            BracketToolCall {
                name: "a".to_string(),
                input: json!({"x":1}),
            },
            BracketToolCall {
                name: "a".to_string(),
                input: json!({"x":2}),
            },
        ];
        let deduped = deduplicate_tool_calls(calls);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_deduplicate_key_order_insensitive() {
        let first: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let second: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        let deduped = deduplicate_tool_calls(vec![
            BracketToolCall {
                name: "t".to_string(),
                input: first,
            },
            BracketToolCall {
                name: "t".to_string(),
                input: second,
            },
        ]);
        assert_eq!(deduped.len(), 1);
    }
}
