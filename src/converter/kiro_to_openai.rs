//!
//! Kiro to OpenAI format converter for streaming responses.
//!
//! Renders the typed events produced by the event-stream parser as
//! OpenAI-compatible chat completion chunks, and reduces a chunk sequence
//! to a single completion object for non-streaming clients. Token usage is
//! synthesized from the upstream's context-usage and credit signals.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids;
use crate::parser::StreamEvent;

/* --- types ----------------------------------------------------------------------------------- */

///
/// One OpenAI streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /** completion id shared by every chunk of the response */
    pub id: String,
    /** always "chat.completion.chunk" */
    pub object: String,
    /** creation timestamp shared by every chunk */
    pub created: i64,
    /** model name as the client sent it */
    pub model: String,
    /** single choice; empty on the usage chunk */
    pub choices: Vec<ChunkChoice>,
    /** synthesized usage, present on the terminal usage chunk only */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

///
/// Chunk choice wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /** always 0; the proxy produces one choice */
    pub index: u32,
    /** incremental delta */
    pub delta: ChunkDelta,
    /** set on the finish chunk only */
    pub finish_reason: Option<String>,
}

///
/// Incremental delta within a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /** "assistant", sent exactly once in the first chunk */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /** text content fragment */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /** tool call fragments */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

///
/// Tool call fragment within a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkToolCall {
    /** stable index identifying the tool call across chunks */
    pub index: u32,
    /** tool call id, present on the opening fragment */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /** "function", present on the opening fragment */
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    /** function name/arguments fragment */
    pub function: ChunkFunction,
}

///
/// Function fragment within a tool call delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

///
/// Synthesized usage block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /** upstream credit cost, when reported */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<f64>,
}

///
/// Complete (non-streaming) chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    /** always "chat.completion" */
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ResponseChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

///
/// Choice within a complete response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

///
/// Assistant message within a complete response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

///
/// Reconstructed tool call within a complete response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ResponseFunctionCall,
}

///
/// Function name and full arguments string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFunctionCall {
    pub name: String,
    pub arguments: String,
}

///
/// Per-response state for rendering parser events as OpenAI chunks.
///
/// Every chunk of one response shares the completion id and created
/// timestamp; the assistant role is sent exactly once, in the first chunk.
pub struct StreamTranscoder {
    /** completion id shared across chunks */
    completion_id: String,
    /** creation timestamp shared across chunks */
    created: i64,
    /** model name echoed back to the client */
    model: String,
    /** context window used for prompt token estimation */
    max_input_tokens: u32,
    /** role chunk already emitted */
    emitted_role: bool,
    /** finish chunk already emitted */
    finished: bool,
    /** toolUseId to OpenAI tool call index */
    tool_indices: HashMap<String, u32>,
    /** next tool call index to allocate */
    tool_index_counter: u32,
    /** total characters of content emitted, for completion token estimation */
    chars_emitted: usize,
    /** latest context usage report */
    context_usage_percent: Option<f64>,
    /** latest credit report */
    credits_used: Option<f64>,
    /** per-model credit cost from the model cache, used when the stream reports none */
    default_credits_used: Option<f64>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Object type for streaming chunks */
const CHUNK_OBJECT: &str = "chat.completion.chunk";

/** Object type for complete responses */
const COMPLETION_OBJECT: &str = "chat.completion";

/** Characters per token for the synthetic completion count */
const CHARS_PER_TOKEN: usize = 4;

/* --- start of code -------------------------------------------------------------------------- */

impl StreamTranscoder {
    ///
    /// Create a transcoder for one response.
    ///
    /// # Arguments
    ///  * `model` - model name as the client sent it
    ///  * `max_input_tokens` - context window for prompt token estimation
    ///  * `default_credits_used` - cached per-model credit cost, reported in
    ///    the usage chunk when the stream carries no credit event
    pub fn new(model: &str, max_input_tokens: u32, default_credits_used: Option<f64>) -> Self {
        Self {
            completion_id: ids::completion_id(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            max_input_tokens,
            emitted_role: false,
            finished: false,
            tool_indices: HashMap::new(),
            tool_index_counter: 0,
            chars_emitted: 0,
            context_usage_percent: None,
            credits_used: None,
            default_credits_used,
        }
    }

    /// Completion id shared by every chunk of this response.
    pub fn completion_id(&self) -> &str {
        &self.completion_id
    }

    /// True once the finish chunk has been rendered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    ///
    /// Render one parser event as zero or more chunks.
    ///
    /// The first rendered chunk of the response is always the role chunk.
    /// `End` produces the finish chunk, then the usage chunk when the
    /// upstream reported context usage or credits.
    ///
    /// # Arguments
    ///  * `event` - event from the stream parser
    ///
    /// # Returns
    ///  * Chunks to send downstream, in order
    pub fn on_event(&mut self, event: &StreamEvent) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();

        match event {
            StreamEvent::Content { text } => {
                self.ensure_role(&mut chunks);
                self.chars_emitted += text.chars().count();
                chunks.push(self.delta_chunk(ChunkDelta {
                    content: Some(text.clone()),
                    ..Default::default()
                }));
            }

            StreamEvent::ToolStart { id, name } => {
                self.ensure_role(&mut chunks);
                let index = self.tool_index_counter;
                self.tool_index_counter += 1;
                self.tool_indices.insert(id.clone(), index);

                let call_id = if id.is_empty() { ids::tool_call_id() } else { id.clone() };
                chunks.push(self.delta_chunk(ChunkDelta {
                    tool_calls: Some(vec![ChunkToolCall {
                        index,
                        id: Some(call_id),
                        call_type: Some("function".to_string()),
                        function: ChunkFunction {
                            name: Some(name.clone()),
                            arguments: Some(String::new()),
                        },
                    }]),
                    ..Default::default()
                }));
            }

            StreamEvent::ToolInput { id, text } => {
                self.ensure_role(&mut chunks);
                let index = self
                    .tool_indices
                    .get(id)
                    .copied()
                    .unwrap_or_else(|| self.tool_index_counter.saturating_sub(1));
                chunks.push(self.delta_chunk(ChunkDelta {
                    tool_calls: Some(vec![ChunkToolCall {
                        index,
                        id: None,
                        call_type: None,
                        function: ChunkFunction {
                            name: None,
                            arguments: Some(text.clone()),
                        },
                    }]),
                    ..Default::default()
                }));
            }

            // Stop is implicit: arguments are complete once observed.
            StreamEvent::ToolStop { .. } => {}

            StreamEvent::ContextUsage { percent } => {
                self.context_usage_percent = Some(*percent);
            }

            StreamEvent::Usage { credits } => {
                self.credits_used = Some(*credits);
            }

            StreamEvent::End => {
                self.ensure_role(&mut chunks);
                if !self.finished {
                    self.finished = true;
                    let finish_reason = if self.tool_index_counter > 0 {
                        "tool_calls"
                    } else {
                        "stop"
                    };
                    let mut finish = self.delta_chunk(ChunkDelta::default());
                    finish.choices[0].finish_reason = Some(finish_reason.to_string());
                    chunks.push(finish);

                    if let Some(usage) = self.synthesize_usage() {
                        chunks.push(ChatCompletionChunk {
                            id: self.completion_id.clone(),
                            object: CHUNK_OBJECT.to_string(),
                            created: self.created,
                            model: self.model.clone(),
                            choices: Vec::new(),
                            usage: Some(usage),
                        });
                    }
                }
            }
        }

        chunks
    }

    ///
    /// Synthesize the usage block from upstream signals.
    ///
    /// Completion tokens are estimated from emitted characters; prompt tokens
    /// from the context usage percentage when known. Returns None when the
    /// upstream reported neither credits nor context usage.
    fn synthesize_usage(&self) -> Option<UsageInfo> {
        if self.context_usage_percent.is_none() && self.credits_used.is_none() {
            return None;
        }

        let completion_tokens = (self.chars_emitted / CHARS_PER_TOKEN) as u32;
        let prompt_tokens = self
            .context_usage_percent
            .map(|percent| (percent * self.max_input_tokens as f64 / 100.0).round() as u32)
            .unwrap_or(0);

        Some(UsageInfo {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            credits_used: self.credits_used.or(self.default_credits_used),
        })
    }

    /// Emit the role chunk if it has not been sent yet.
    fn ensure_role(&mut self, chunks: &mut Vec<ChatCompletionChunk>) {
        if !self.emitted_role {
            self.emitted_role = true;
            chunks.push(self.delta_chunk(ChunkDelta {
                role: Some("assistant".to_string()),
                ..Default::default()
            }));
        }
    }

    /// Build a single-choice chunk around a delta.
    fn delta_chunk(&self, delta: ChunkDelta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.completion_id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
            usage: None,
        }
    }
}

///
/// Reduce a chunk sequence to a single completion response.
///
/// Content fragments are concatenated; tool calls are reconstructed by
/// index. The id, created timestamp, and finish reason come from the chunk
/// stream verbatim.
///
/// # Arguments
///  * `chunks` - complete chunk sequence of one response
///  * `model` - model name echoed back to the client
///
/// # Returns
///  * OpenAI chat completion object
pub fn collect_chunks(chunks: &[ChatCompletionChunk], model: &str) -> ChatCompletionResponse {
    let mut content = String::new();
    let mut finish_reason = None;
    let mut usage = None;
    let mut tool_calls: Vec<(u32, ResponseToolCall)> = Vec::new();

    for chunk in chunks {
        if chunk.usage.is_some() {
            usage = chunk.usage.clone();
        }
        for choice in &chunk.choices {
            if let Some(reason) = &choice.finish_reason {
                finish_reason = Some(reason.clone());
            }
            if let Some(text) = &choice.delta.content {
                content.push_str(text);
            }
            if let Some(fragments) = &choice.delta.tool_calls {
                for fragment in fragments {
                    match tool_calls.iter_mut().find(|(index, _)| *index == fragment.index) {
                        Some((_, call)) => {
                            if let Some(name) = &fragment.function.name {
                                call.function.name.push_str(name);
                            }
                            if let Some(arguments) = &fragment.function.arguments {
                                call.function.arguments.push_str(arguments);
                            }
                        }
                        None => {
                            tool_calls.push((
                                fragment.index,
                                ResponseToolCall {
                                    id: fragment
                                        .id
                                        .clone()
                                        .unwrap_or_else(ids::tool_call_id),
                                    call_type: "function".to_string(),
                                    function: ResponseFunctionCall {
                                        name: fragment.function.name.clone().unwrap_or_default(),
                                        arguments: fragment
                                            .function
                                            .arguments
                                            .clone()
                                            .unwrap_or_default(),
                                    },
                                },
                            ));
                        }
                    }
                }
            }
        }
    }

    tool_calls.sort_by_key(|(index, _)| *index);
    let tool_calls: Vec<ResponseToolCall> =
        tool_calls.into_iter().map(|(_, call)| call).collect();

    let (id, created) = chunks
        .first()
        .map(|chunk| (chunk.id.clone(), chunk.created))
        .unwrap_or_else(|| (ids::completion_id(), chrono::Utc::now().timestamp()));

    ChatCompletionResponse {
        id,
        object: COMPLETION_OBJECT.to_string(),
        created,
        model: model.to_string(),
        choices: vec![ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: Some(content),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
            finish_reason,
        }],
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(events: &[StreamEvent]) -> (StreamTranscoder, Vec<ChatCompletionChunk>) {
        let mut transcoder = StreamTranscoder::new("claude-sonnet-4-5", 200_000, None);
        let mut chunks = Vec::new();
        for event in events {
            chunks.extend(transcoder.on_event(event));
        }
        (transcoder, chunks)
    }

    fn content(text: &str) -> StreamEvent {
        StreamEvent::Content {
            text: text.to_string(),
        }
    }

    /* --- chunk invariants ---------------------------------------------------------------- */

    #[test]
    fn test_simple_text_stream() {
        let (_, chunks) = drive(&[content("Hello"), StreamEvent::End]);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunks[1].choices[0].delta.content.as_deref(), Some("Hello"));
        assert_eq!(chunks[2].choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_all_chunks_share_id_and_created() {
        let (transcoder, chunks) = drive(&[content("a"), content("b"), StreamEvent::End]);
        for chunk in &chunks {
            assert_eq!(chunk.id, transcoder.completion_id());
            assert_eq!(chunk.created, chunks[0].created);
            assert_eq!(chunk.object, "chat.completion.chunk");
        }
        assert!(chunks[0].id.starts_with("chatcmpl-"));
    }

    #[test]
    fn test_role_emitted_exactly_once() {
        let (_, chunks) = drive(&[content("a"), content("b"), StreamEvent::End]);
        let role_chunks = chunks
            .iter()
            .filter(|c| c.choices.first().map(|ch| ch.delta.role.is_some()).unwrap_or(false))
            .count();
        assert_eq!(role_chunks, 1);
    }

    #[test]
    fn test_finish_chunk_emitted_exactly_once() {
        let mut transcoder = StreamTranscoder::new("m", 200_000, None);
        let first = transcoder.on_event(&StreamEvent::End);
        let second = transcoder.on_event(&StreamEvent::End);
        assert!(first.iter().any(|c| c
            .choices
            .first()
            .map(|ch| ch.finish_reason.is_some())
            .unwrap_or(false)));
        assert!(second.is_empty());
        assert!(transcoder.is_finished());
    }

    #[test]
    fn test_empty_stream_still_emits_role_and_finish() {
        let (_, chunks) = drive(&[StreamEvent::End]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunks[1].choices[0].finish_reason.as_deref(), Some("stop"));
    }

    /* --- tool calls ---------------------------------------------------------------------- */

    #[test]
    fn test_tool_call_stream() {
        let (_, chunks) = drive(&[
            StreamEvent::ToolStart {
                id: "u1".to_string(),
                name: "get_weather".to_string(),
            },
            StreamEvent::ToolInput {
                id: "u1".to_string(),
                text: "{\"loc\":\"NYC\"}".to_string(),
            },
            StreamEvent::ToolStop {
                id: "u1".to_string(),
            },
            StreamEvent::End,
        ]);

        // role, tool start, tool input, finish
        assert_eq!(chunks.len(), 4);

        let start = chunks[1].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(start[0].index, 0);
        assert_eq!(start[0].id.as_deref(), Some("u1"));
        assert_eq!(start[0].call_type.as_deref(), Some("function"));
        assert_eq!(start[0].function.name.as_deref(), Some("get_weather"));
        assert_eq!(start[0].function.arguments.as_deref(), Some(""));

        let input = chunks[2].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(input[0].index, 0);
        assert!(input[0].id.is_none());
        assert_eq!(input[0].function.arguments.as_deref(), Some("{\"loc\":\"NYC\"}"));

        assert_eq!(chunks[3].choices[0].finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_multiple_tool_calls_get_sequential_indices() {
        let (_, chunks) = drive(&[
            StreamEvent::ToolStart {
                id: "a".to_string(),
                name: "first".to_string(),
            },
            StreamEvent::ToolStart {
                id: "b".to_string(),
                name: "second".to_string(),
            },
            StreamEvent::ToolInput {
                id: "b".to_string(),
                text: "{}".to_string(),
            },
            StreamEvent::End,
        ]);

        let first = chunks[1].choices[0].delta.tool_calls.as_ref().unwrap();
        let second = chunks[2].choices[0].delta.tool_calls.as_ref().unwrap();
        let input = chunks[3].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(first[0].index, 0);
        assert_eq!(second[0].index, 1);
        assert_eq!(input[0].index, 1);
    }

    #[test]
    fn test_synthesized_tool_start_without_upstream_id() {
        let (_, chunks) = drive(&[
            StreamEvent::ToolStart {
                id: String::new(),
                name: "bash".to_string(),
            },
            StreamEvent::End,
        ]);
        let start = chunks[1].choices[0].delta.tool_calls.as_ref().unwrap();
        assert!(start[0].id.as_ref().unwrap().starts_with("call_"));
    }

    /* --- usage synthesis ----------------------------------------------------------------- */

    #[test]
    fn test_usage_chunk_from_context_and_credits() {
        let (_, chunks) = drive(&[
            content("12345678"),
            StreamEvent::ContextUsage { percent: 10.0 },
            StreamEvent::Usage { credits: 0.5 },
            StreamEvent::End,
        ]);

        let usage_chunk = chunks.last().unwrap();
        assert!(usage_chunk.choices.is_empty());
        let usage = usage_chunk.usage.as_ref().unwrap();
        // 10% of 200k context
        assert_eq!(usage.prompt_tokens, 20_000);
        // 8 chars / 4
        assert_eq!(usage.completion_tokens, 2);
        assert_eq!(usage.total_tokens, 20_002);
        assert_eq!(usage.credits_used, Some(0.5));
    }

    #[test]
    fn test_no_usage_chunk_without_signals() {
        let (_, chunks) = drive(&[content("hi"), StreamEvent::End]);
        assert!(chunks.iter().all(|c| c.usage.is_none()));
    }

    #[test]
    fn test_cached_credit_default_fills_missing_credit_event() {
        // Context usage arrives but no credit event; the cached per-model
        // cost backs the usage chunk.
        let mut transcoder = StreamTranscoder::new("m", 200_000, Some(1.0));
        let mut chunks = Vec::new();
        for event in [
            content("abcd"),
            StreamEvent::ContextUsage { percent: 10.0 },
            StreamEvent::End,
        ] {
            chunks.extend(transcoder.on_event(&event));
        }
        let usage = chunks.last().unwrap().usage.as_ref().unwrap();
        assert_eq!(usage.credits_used, Some(1.0));
    }

    #[test]
    fn test_stream_credit_event_overrides_cached_default() {
        let mut transcoder = StreamTranscoder::new("m", 200_000, Some(1.0));
        let mut chunks = Vec::new();
        for event in [
            content("abcd"),
            StreamEvent::Usage { credits: 2.5 },
            StreamEvent::End,
        ] {
            chunks.extend(transcoder.on_event(&event));
        }
        let usage = chunks.last().unwrap().usage.as_ref().unwrap();
        assert_eq!(usage.credits_used, Some(2.5));
    }

    #[test]
    fn test_cached_default_alone_does_not_force_usage_chunk() {
        // No upstream signal at all; the cached default must not fabricate
        // a usage chunk on its own.
        let mut transcoder = StreamTranscoder::new("m", 200_000, Some(1.0));
        let mut chunks = Vec::new();
        for event in [content("hi"), StreamEvent::End] {
            chunks.extend(transcoder.on_event(&event));
        }
        assert!(chunks.iter().all(|c| c.usage.is_none()));
    }

    #[test]
    fn test_usage_without_context_percent_has_zero_prompt_tokens() {
        let (_, chunks) = drive(&[
            content("abcd"),
            StreamEvent::Usage { credits: 1.0 },
            StreamEvent::End,
        ]);
        let usage = chunks.last().unwrap().usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 1);
    }

    /* --- collector ----------------------------------------------------------------------- */

    #[test]
    fn test_collect_simple_text() {
        let (_, chunks) = drive(&[content("Hel"), content("lo"), StreamEvent::End]);
        let response = collect_chunks(&chunks, "claude-sonnet-4-5");

        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.id, chunks[0].id);
        assert_eq!(response.created, chunks[0].created);
        assert_eq!(response.choices[0].message.role, "assistant");
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Hello"));
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(response.choices[0].message.tool_calls.is_none());
    }

    #[test]
    fn test_collect_reconstructs_tool_calls_by_index() {
        let (_, chunks) = drive(&[
            StreamEvent::ToolStart {
                id: "u1".to_string(),
                name: "get_weather".to_string(),
            },
            StreamEvent::ToolInput {
                id: "u1".to_string(),
                text: "{\"loc\":".to_string(),
            },
            StreamEvent::ToolInput {
                id: "u1".to_string(),
                text: "\"NYC\"}".to_string(),
            },
            StreamEvent::End,
        ]);
        let response = collect_chunks(&chunks, "m");

        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "u1");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"loc\":\"NYC\"}");
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_collect_carries_usage() {
        let (_, chunks) = drive(&[
            content("text"),
            StreamEvent::Usage { credits: 2.0 },
            StreamEvent::End,
        ]);
        let response = collect_chunks(&chunks, "m");
        assert_eq!(response.usage.as_ref().unwrap().credits_used, Some(2.0));
    }
}
