//!
//! OpenAI to Kiro format converter for API request translation.
//!
//! Converts OpenAI-compatible chat completion requests into the
//! `conversationState` payload the Kiro generateAssistantResponse endpoint
//! expects. Handles system prompt relocation, tool calling, tool results,
//! merging of adjacent same-role turns, and the relocation of oversized tool
//! descriptions into the system prompt.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// OpenAI chat completion request structure.
///
/// Represents an incoming request in OpenAI's chat completions API format.
/// Contains messages, model selection, and optional tool definitions.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /** the model identifier to use for completion */
    pub model: String,
    /** conversation messages array */
    pub messages: Vec<ChatMessage>,
    /** available tools for function calling */
    pub tools: Option<Vec<OpenAiTool>>,
    /** whether to stream the response */
    pub stream: Option<bool>,
}

///
/// OpenAI message structure within a chat completion request.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    /** message role: system, user, assistant, or tool */
    pub role: String,
    /** message content, can be string or structured blocks */
    pub content: Option<MessageContent>,
    /** tool calls made by the assistant */
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /** tool call ID for tool response messages */
    pub tool_call_id: Option<String>,
}

///
/// OpenAI content union type for flexible message content.
///
/// Supports both simple string content and structured content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /** simple string content */
    String(String),
    /** structured content blocks array */
    Array(Vec<ContentBlock>),
}

///
/// OpenAI structured content block.
///
/// Only textual parts contribute to the upstream payload; other part types
/// (image_url etc.) are ignored.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    /** content block type */
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    /** text content for text blocks */
    pub text: Option<String>,
}

///
/// OpenAI tool call structure for function invocations.
#[derive(Debug, Deserialize)]
pub struct OpenAiToolCall {
    /** unique identifier for this tool call */
    pub id: String,
    /** function call details */
    pub function: OpenAiFunctionCall,
}

///
/// OpenAI function call details within a tool call.
#[derive(Debug, Deserialize)]
pub struct OpenAiFunctionCall {
    /** function name to call */
    pub name: String,
    /** function arguments; a JSON string in OpenAI's wire format */
    pub arguments: Value,
}

///
/// OpenAI tool definition for available functions.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiTool {
    /** tool type, typically "function" */
    #[serde(rename = "type", default)]
    pub tool_type: Option<String>,
    /** function definition and schema */
    pub function: OpenAiToolFunction,
}

///
/// OpenAI function definition within a tool.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiToolFunction {
    /** function name */
    pub name: String,
    /** function description */
    pub description: Option<String>,
    /** JSON schema for function parameters */
    pub parameters: Option<Value>,
}

///
/// Complete payload for the generateAssistantResponse endpoint.
#[derive(Debug, Serialize)]
pub struct KiroPayload {
    /** conversation state with history and current message */
    #[serde(rename = "conversationState")]
    pub conversation_state: ConversationState,
    /** CodeWhisperer profile ARN */
    #[serde(rename = "profileArn", skip_serializing_if = "Option::is_none")]
    pub profile_arn: Option<String>,
}

///
/// Conversation state in Kiro format.
#[derive(Debug, Serialize)]
pub struct ConversationState {
    /** always "MANUAL" for proxied chat requests */
    #[serde(rename = "chatTriggerType")]
    pub chat_trigger_type: String,
    /** fresh UUID per request */
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    /** the turn being answered */
    #[serde(rename = "currentMessage")]
    pub current_message: CurrentMessage,
    /** prior turns, strictly alternating roles */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryTurn>>,
}

///
/// Wrapper around the current user input message.
#[derive(Debug, Serialize)]
pub struct CurrentMessage {
    #[serde(rename = "userInputMessage")]
    pub user_input_message: UserInputMessage,
}

///
/// One history turn; exactly one of the variants per entry.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HistoryTurn {
    User {
        #[serde(rename = "userInputMessage")]
        user_input_message: UserInputMessage,
    },
    Assistant {
        #[serde(rename = "assistantResponseMessage")]
        assistant_response_message: AssistantResponseMessage,
    },
}

///
/// A user turn in Kiro format.
#[derive(Debug, Serialize)]
pub struct UserInputMessage {
    /** plain text content; never empty on the wire */
    pub content: String,
    /** internal model identifier */
    #[serde(rename = "modelId")]
    pub model_id: String,
    /** request origin marker */
    pub origin: String,
    /** tools and tool results riding with this turn */
    #[serde(
        rename = "userInputMessageContext",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<UserInputMessageContext>,
}

///
/// Context attached to a user turn.
#[derive(Debug, Serialize)]
pub struct UserInputMessageContext {
    /** tool specifications available to the model */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<KiroTool>>,
    /** results answering earlier tool uses */
    #[serde(rename = "toolResults", skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<KiroToolResult>>,
}

///
/// An assistant turn in Kiro format.
#[derive(Debug, Serialize)]
pub struct AssistantResponseMessage {
    /** plain text content */
    pub content: String,
    /** tool invocations made in this turn */
    #[serde(rename = "toolUses", skip_serializing_if = "Option::is_none")]
    pub tool_uses: Option<Vec<KiroToolUse>>,
}

///
/// Tool definition wrapper in Kiro format.
#[derive(Debug, Clone, Serialize)]
pub struct KiroTool {
    #[serde(rename = "toolSpecification")]
    pub tool_specification: ToolSpecification,
}

///
/// Tool specification in Kiro format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpecification {
    /** tool name */
    pub name: String,
    /** bounded description; oversized originals are relocated */
    pub description: String,
    /** JSON schema wrapper */
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

///
/// Schema wrapper; the upstream nests the schema under a `json` key.
#[derive(Debug, Clone, Serialize)]
pub struct InputSchema {
    pub json: Value,
}

///
/// A tool invocation in an assistant turn.
#[derive(Debug, Clone, Serialize)]
pub struct KiroToolUse {
    #[serde(rename = "toolUseId")]
    pub tool_use_id: String,
    pub name: String,
    pub input: Value,
}

///
/// A tool result in a user turn.
#[derive(Debug, Clone, Serialize)]
pub struct KiroToolResult {
    #[serde(rename = "toolUseId")]
    pub tool_use_id: String,
    pub content: Vec<ToolResultContent>,
    pub status: String,
}

///
/// Tool result content element.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultContent {
    pub text: String,
}

///
/// Normalized working turn used while restructuring the conversation.
///
/// Tool-role messages are converted to user turns carrying tool results
/// before merging, so only user and assistant roles remain here.
#[derive(Debug)]
pub struct WorkTurn {
    /** "user" or "assistant" */
    pub role: String,
    /** concatenated text content */
    pub text: String,
    /** tool invocations (assistant turns) */
    pub tool_uses: Vec<KiroToolUse>,
    /** tool results (user turns) */
    pub tool_results: Vec<KiroToolResult>,
}

///
/// Converter from OpenAI format to the Kiro payload.
///
/// Follows Single Responsibility Principle - handles only format conversion
/// from OpenAI chat completions to the Kiro conversation state.
pub struct OpenAiToKiroConverter {
    /** descriptions longer than this move to the system prompt */
    tool_description_max_length: usize,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Chat trigger type for proxied requests */
const CHAT_TRIGGER_TYPE: &str = "MANUAL";

/** Origin marker expected by the upstream */
const ORIGIN: &str = "AI_EDITOR";

/** Content sent when a turn would otherwise be empty */
const CONTINUE_CONTENT: &str = "Continue";

/** Placeholder for empty history turn content; the upstream rejects "" */
const EMPTY_CONTENT: &str = "(empty)";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Extract text content from any supported content shape.
///
/// Concatenates the textual parts of structured content and ignores
/// non-text parts.
///
/// # Arguments
///  * `content` - optional message content
///
/// # Returns
///  * Extracted text, empty string when there is none
pub fn extract_text_content(content: &Option<MessageContent>) -> String {
    match content {
        None => String::new(),
        Some(MessageContent::String(text)) => text.clone(),
        Some(MessageContent::Array(blocks)) => blocks
            .iter()
            .filter(|block| {
                block
                    .block_type
                    .as_deref()
                    .map(|t| t == "text")
                    .unwrap_or(block.text.is_some())
            })
            .filter_map(|block| block.text.as_deref())
            .collect(),
    }
}

///
/// Merge adjacent same-role turns.
///
/// The upstream forbids consecutive turns with the same role. Text content is
/// concatenated with a newline; tool uses and tool results are unioned in
/// order. Applying this twice yields the same result as applying it once.
///
/// # Arguments
///  * `turns` - normalized turns in conversation order
///
/// # Returns
///  * Turns with no two adjacent entries sharing a role
pub fn merge_adjacent_messages(turns: Vec<WorkTurn>) -> Vec<WorkTurn> {
    let mut merged: Vec<WorkTurn> = Vec::with_capacity(turns.len());

    for turn in turns {
        match merged.last_mut() {
            Some(last) if last.role == turn.role => {
                if !turn.text.is_empty() {
                    if !last.text.is_empty() {
                        last.text.push('\n');
                    }
                    last.text.push_str(&turn.text);
                }
                last.tool_uses.extend(turn.tool_uses);
                last.tool_results.extend(turn.tool_results);
            }
            _ => merged.push(turn),
        }
    }

    merged
}

///
/// Relocate oversized tool descriptions into out-of-band documentation.
///
/// Tools whose description fits the limit pass through unchanged. Longer
/// descriptions are replaced by a reference sentinel pointing at a
/// `## Tool: {name}` section, and the original text is returned separately
/// for inclusion in the system prompt.
///
/// # Arguments
///  * `tools` - tool definitions from the request
///  * `max_length` - maximum accepted description length; 0 disables the rewrite
///
/// # Returns
///  * Tuple of (rewritten Kiro tools, `(name, original description)` pairs)
pub fn process_tools_with_long_descriptions(
    tools: &[OpenAiTool],
    max_length: usize,
) -> (Vec<KiroTool>, Vec<(String, String)>) {
    let mut processed = Vec::with_capacity(tools.len());
    let mut extra_docs = Vec::new();

    for tool in tools {
        let name = tool.function.name.clone();
        let description = tool.function.description.clone().unwrap_or_default();

        let description = if description.trim().is_empty() {
            // The upstream requires a non-empty description.
            format!("Tool: {}", name)
        } else if max_length > 0 && description.chars().count() > max_length {
            tracing::debug!(
                "Tool '{}' description ({} chars) exceeds limit {}, moving to system prompt",
                name,
                description.chars().count(),
                max_length
            );
            extra_docs.push((name.clone(), description));
            format!("[Full documentation in system prompt under '## Tool: {}']", name)
        } else {
            description
        };

        processed.push(KiroTool {
            tool_specification: ToolSpecification {
                name,
                description,
                input_schema: InputSchema {
                    json: sanitize_json_schema(tool.function.parameters.as_ref()),
                },
            },
        });
    }

    (processed, extra_docs)
}

///
/// Strip JSON Schema constructs the upstream rejects.
///
/// Empty `required` arrays and `additionalProperties` keys cause a 400 from
/// the upstream; both are removed recursively.
///
/// # Arguments
///  * `schema` - optional schema from the tool definition
///
/// # Returns
///  * Sanitized copy, or an empty object when no schema was given
pub fn sanitize_json_schema(schema: Option<&Value>) -> Value {
    match schema {
        None => Value::Object(Default::default()),
        Some(Value::Object(map)) => {
            let mut result = serde_json::Map::new();
            for (key, value) in map {
                if key == "additionalProperties" {
                    continue;
                }
                if key == "required" {
                    if let Value::Array(items) = value {
                        if items.is_empty() {
                            continue;
                        }
                    }
                }
                result.insert(key.clone(), sanitize_json_schema(Some(value)));
            }
            Value::Object(result)
        }
        Some(Value::Array(items)) => {
            Value::Array(items.iter().map(|v| sanitize_json_schema(Some(v))).collect())
        }
        Some(other) => other.clone(),
    }
}

impl OpenAiToKiroConverter {
    ///
    /// Create a new OpenAI to Kiro converter.
    ///
    /// # Arguments
    ///  * `tool_description_max_length` - description length limit
    ///
    /// # Returns
    ///  * New converter instance
    pub fn new(tool_description_max_length: usize) -> Self {
        Self {
            tool_description_max_length,
        }
    }

    ///
    /// Convert an OpenAI request to the Kiro payload.
    ///
    /// Restructures the conversation: system prompt extraction and
    /// recomposition, tool description relocation, adjacent-turn merging,
    /// and the split into history plus current message.
    ///
    /// # Arguments
    ///  * `request` - validated OpenAI request
    ///  * `model_id` - internal model identifier (already mapped)
    ///  * `conversation_id` - fresh conversation UUID
    ///  * `profile_arn` - CodeWhisperer profile ARN, if configured
    ///
    /// # Returns
    ///  * Payload ready to POST to generateAssistantResponse
    ///  * `ProxyError::Conversion` if the request cannot be represented
    pub fn convert(
        &self,
        request: &ChatCompletionRequest,
        model_id: &str,
        conversation_id: String,
        profile_arn: Option<String>,
    ) -> Result<KiroPayload> {
        let tools = request.tools.as_deref().unwrap_or(&[]);
        let (kiro_tools, extra_docs) =
            process_tools_with_long_descriptions(tools, self.tool_description_max_length);

        let (system_prompt, working) = self.split_system_messages(&request.messages)?;
        let system_prompt = compose_system_prompt(&system_prompt, &extra_docs);

        let mut merged = merge_adjacent_messages(working);

        // The effective system prompt rides at the start of the first user turn.
        let mut prepend_to_current = !system_prompt.is_empty();
        if !system_prompt.is_empty() {
            if let Some(first_user) = merged.iter_mut().find(|t| t.role == "user") {
                first_user.text = if first_user.text.is_empty() {
                    system_prompt.clone()
                } else {
                    format!("{}\n\n{}", system_prompt, first_user.text)
                };
                prepend_to_current = false;
            }
        }

        // An assistant-final conversation moves into history and the upstream
        // is asked to continue it.
        if merged.last().map(|t| t.role.as_str()) == Some("assistant") {
            merged.push(WorkTurn {
                role: "user".to_string(),
                text: CONTINUE_CONTENT.to_string(),
                tool_uses: Vec::new(),
                tool_results: Vec::new(),
            });
        }

        let current = merged.pop().unwrap_or_else(|| WorkTurn {
            role: "user".to_string(),
            text: String::new(),
            tool_uses: Vec::new(),
            tool_results: Vec::new(),
        });

        let history = self.build_history(merged, model_id);

        let mut current_content = current.text;
        if prepend_to_current {
            current_content = if current_content.is_empty() {
                system_prompt
            } else {
                format!("{}\n\n{}", system_prompt, current_content)
            };
        }
        if current_content.is_empty() {
            current_content = CONTINUE_CONTENT.to_string();
        }

        let context = build_context(
            if kiro_tools.is_empty() { None } else { Some(kiro_tools) },
            if current.tool_results.is_empty() {
                None
            } else {
                Some(current.tool_results)
            },
        );

        Ok(KiroPayload {
            conversation_state: ConversationState {
                chat_trigger_type: CHAT_TRIGGER_TYPE.to_string(),
                conversation_id,
                current_message: CurrentMessage {
                    user_input_message: UserInputMessage {
                        content: current_content,
                        model_id: model_id.to_string(),
                        origin: ORIGIN.to_string(),
                        context,
                    },
                },
                history: if history.is_empty() { None } else { Some(history) },
            },
            profile_arn,
        })
    }

    ///
    /// Separate system messages from the conversation.
    ///
    /// System message content is concatenated into the system prompt; the
    /// remaining messages become normalized working turns. Tool-role messages
    /// turn into user turns carrying tool results.
    ///
    /// # Returns
    ///  * Tuple of (system prompt, working turns)
    fn split_system_messages(&self, messages: &[ChatMessage]) -> Result<(String, Vec<WorkTurn>)> {
        let mut system_parts = Vec::new();
        let mut working = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => {
                    let text = extract_text_content(&msg.content);
                    if !text.is_empty() {
                        system_parts.push(text);
                    }
                }
                "user" => working.push(WorkTurn {
                    role: "user".to_string(),
                    text: extract_text_content(&msg.content),
                    tool_uses: Vec::new(),
                    tool_results: Vec::new(),
                }),
                "assistant" => working.push(WorkTurn {
                    role: "assistant".to_string(),
                    text: extract_text_content(&msg.content),
                    tool_uses: convert_tool_calls(msg.tool_calls.as_deref().unwrap_or(&[])),
                    tool_results: Vec::new(),
                }),
                "tool" => {
                    let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                    let text = extract_text_content(&msg.content);
                    working.push(WorkTurn {
                        role: "user".to_string(),
                        text: String::new(),
                        tool_uses: Vec::new(),
                        tool_results: vec![KiroToolResult {
                            tool_use_id,
                            content: vec![ToolResultContent {
                                text: if text.is_empty() {
                                    "(empty result)".to_string()
                                } else {
                                    text
                                },
                            }],
                            status: "success".to_string(),
                        }],
                    });
                }
                other => {
                    return Err(ProxyError::Conversion(format!(
                        "Unknown message role: {}",
                        other
                    )));
                }
            }
        }

        Ok((system_parts.join("\n"), working))
    }

    ///
    /// Render working turns as Kiro history entries.
    fn build_history(&self, turns: Vec<WorkTurn>, model_id: &str) -> Vec<HistoryTurn> {
        turns
            .into_iter()
            .map(|turn| {
                let content = if turn.text.is_empty() {
                    EMPTY_CONTENT.to_string()
                } else {
                    turn.text
                };
                if turn.role == "assistant" {
                    HistoryTurn::Assistant {
                        assistant_response_message: AssistantResponseMessage {
                            content,
                            tool_uses: if turn.tool_uses.is_empty() {
                                None
                            } else {
                                Some(turn.tool_uses)
                            },
                        },
                    }
                } else {
                    HistoryTurn::User {
                        user_input_message: UserInputMessage {
                            content,
                            model_id: model_id.to_string(),
                            origin: ORIGIN.to_string(),
                            context: build_context(
                                None,
                                if turn.tool_results.is_empty() {
                                    None
                                } else {
                                    Some(turn.tool_results)
                                },
                            ),
                        },
                    }
                }
            })
            .collect()
    }
}

///
/// Compose the effective system prompt from the base prompt and relocated
/// tool documentation.
fn compose_system_prompt(system_prompt: &str, extra_docs: &[(String, String)]) -> String {
    if extra_docs.is_empty() {
        return system_prompt.to_string();
    }

    let rendered: Vec<String> = extra_docs
        .iter()
        .map(|(name, description)| format!("## Tool: {}\n{}", name, description))
        .collect();
    let rendered = rendered.join("\n\n");

    if system_prompt.is_empty() {
        rendered
    } else {
        format!("{}\n\n{}", system_prompt, rendered)
    }
}

///
/// Convert OpenAI tool calls to Kiro tool uses.
///
/// Arguments arrive as a JSON string; a decode failure wraps the raw text
/// so the call is still representable.
fn convert_tool_calls(tool_calls: &[OpenAiToolCall]) -> Vec<KiroToolUse> {
    tool_calls
        .iter()
        .map(|call| KiroToolUse {
            tool_use_id: call.id.clone(),
            name: call.function.name.clone(),
            input: decode_arguments(&call.function.arguments),
        })
        .collect()
}

/// Decode an OpenAI `arguments` value into structured tool input.
fn decode_arguments(arguments: &Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw })),
        other => other.clone(),
    }
}

/// Build an optional message context, omitting it entirely when empty.
fn build_context(
    tools: Option<Vec<KiroTool>>,
    tool_results: Option<Vec<KiroToolResult>>,
) -> Option<UserInputMessageContext> {
    if tools.is_none() && tool_results.is_none() {
        return None;
    }
    Some(UserInputMessageContext {
        tools,
        tool_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::String(text.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage {
            role: "assistant".to_string(),
            content: Some(MessageContent::String(text.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn system(text: &str) -> ChatMessage {
        ChatMessage {
            role: "system".to_string(),
            content: Some(MessageContent::String(text.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn request(messages: Vec<ChatMessage>, tools: Option<Vec<OpenAiTool>>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages,
            tools,
            stream: Some(false),
        }
    }

    fn weather_tool(description: &str) -> OpenAiTool {
        OpenAiTool {
            tool_type: Some("function".to_string()),
            function: OpenAiToolFunction {
                name: "get_weather".to_string(),
                description: Some(description.to_string()),
                parameters: Some(json!({
                    "type": "object",
                    "properties": { "loc": { "type": "string" } }
                })),
            },
        }
    }

    fn converter() -> OpenAiToKiroConverter {
        OpenAiToKiroConverter::new(10_000)
    }

    /* --- extract_text_content ------------------------------------------------------------ */

    #[test]
    fn test_extract_text_from_string() {
        assert_eq!(
            extract_text_content(&Some(MessageContent::String("Hello".to_string()))),
            "Hello"
        );
    }

    #[test]
    fn test_extract_text_from_parts() {
        let content = MessageContent::Array(vec![
            ContentBlock {
                block_type: Some("text".to_string()),
                text: Some("Hello ".to_string()),
            },
            ContentBlock {
                block_type: Some("image_url".to_string()),
                text: None,
            },
            ContentBlock {
                block_type: Some("text".to_string()),
                text: Some("world".to_string()),
            },
        ]);
        assert_eq!(extract_text_content(&Some(content)), "Hello world");
    }

    #[test]
    fn test_extract_text_from_none() {
        assert_eq!(extract_text_content(&None), "");
    }

    /* --- merge_adjacent_messages --------------------------------------------------------- */

    fn turn(role: &str, text: &str) -> WorkTurn {
        WorkTurn {
            role: role.to_string(),
            text: text.to_string(),
            tool_uses: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    #[test]
    fn test_merge_adjacent_same_role() {
        let merged = merge_adjacent_messages(vec![
            turn("user", "Hello"),
            turn("user", "World"),
            turn("assistant", "Hi"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "Hello\nWorld");
        assert_eq!(merged[1].text, "Hi");
    }

    #[test]
    fn test_merge_preserves_alternation() {
        let merged = merge_adjacent_messages(vec![
            turn("user", "a"),
            turn("assistant", "b"),
            turn("user", "c"),
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let build = || {
            vec![
                turn("user", "U1"),
                turn("user", "U2"),
                turn("assistant", "A1"),
                turn("assistant", "A2"),
                turn("user", "U3"),
            ]
        };
        let once = merge_adjacent_messages(build());
        let twice = merge_adjacent_messages(merge_adjacent_messages(build()));
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn test_merge_unions_tool_uses() {
        let mut first = turn("assistant", "calling");
        first.tool_uses.push(KiroToolUse {
            tool_use_id: "t1".to_string(),
            name: "a".to_string(),
            input: json!({}),
        });
        let mut second = turn("assistant", "");
        second.tool_uses.push(KiroToolUse {
            tool_use_id: "t2".to_string(),
            name: "b".to_string(),
            input: json!({}),
        });
        let merged = merge_adjacent_messages(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tool_uses.len(), 2);
    }

    /* --- tool description relocation ----------------------------------------------------- */

    #[test]
    fn test_short_description_passes_through() {
        let (tools, docs) = process_tools_with_long_descriptions(&[weather_tool("short")], 10_000);
        assert_eq!(tools[0].tool_specification.description, "short");
        assert!(docs.is_empty());
    }

    #[test]
    fn test_long_description_relocated() {
        let long = "d".repeat(10_001);
        let (tools, docs) = process_tools_with_long_descriptions(&[weather_tool(&long)], 10_000);
        assert_eq!(
            tools[0].tool_specification.description,
            "[Full documentation in system prompt under '## Tool: get_weather']"
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "get_weather");
        assert_eq!(docs[0].1, long);
    }

    #[test]
    fn test_boundary_description_not_relocated() {
        let exact = "d".repeat(10_000);
        let (tools, docs) = process_tools_with_long_descriptions(&[weather_tool(&exact)], 10_000);
        assert_eq!(tools[0].tool_specification.description, exact);
        assert!(docs.is_empty());
    }

    #[test]
    fn test_empty_description_gets_placeholder() {
        let (tools, _) = process_tools_with_long_descriptions(&[weather_tool("")], 10_000);
        assert_eq!(tools[0].tool_specification.description, "Tool: get_weather");
    }

    #[test]
    fn test_zero_limit_disables_relocation() {
        let long = "d".repeat(50_000);
        let (tools, docs) = process_tools_with_long_descriptions(&[weather_tool(&long)], 0);
        assert_eq!(tools[0].tool_specification.description, long);
        assert!(docs.is_empty());
    }

    /* --- schema sanitization ------------------------------------------------------------- */

    #[test]
    fn test_sanitize_drops_empty_required_and_additional_properties() {
        let schema = json!({
            "type": "object",
            "required": [],
            "additionalProperties": false,
            "properties": {
                "nested": {
                    "type": "object",
                    "additionalProperties": true,
                    "required": ["x"],
                    "properties": { "x": { "type": "string" } }
                }
            }
        });
        let sanitized = sanitize_json_schema(Some(&schema));
        assert!(sanitized.get("required").is_none());
        assert!(sanitized.get("additionalProperties").is_none());
        assert!(sanitized["properties"]["nested"].get("additionalProperties").is_none());
        assert_eq!(sanitized["properties"]["nested"]["required"], json!(["x"]));
    }

    /* --- full conversion ----------------------------------------------------------------- */

    #[test]
    fn test_simple_request() {
        let payload = converter()
            .convert(
                &request(vec![user("Hi")], None),
                "CLAUDE_SONNET_4_5_20250929_V1_0",
                "conv-1".to_string(),
                Some("arn:test".to_string()),
            )
            .unwrap();

        let state = &payload.conversation_state;
        assert_eq!(state.chat_trigger_type, "MANUAL");
        assert_eq!(state.conversation_id, "conv-1");
        assert!(state.history.is_none());
        assert_eq!(state.current_message.user_input_message.content, "Hi");
        assert_eq!(
            state.current_message.user_input_message.model_id,
            "CLAUDE_SONNET_4_5_20250929_V1_0"
        );
        assert_eq!(payload.profile_arn.as_deref(), Some("arn:test"));
    }

    #[test]
    fn test_system_prompt_prepended_to_first_user_in_history() {
        let payload = converter()
            .convert(
                &request(
                    vec![system("Be brief."), user("one"), assistant("two"), user("three")],
                    None,
                ),
                "m",
                "c".to_string(),
                None,
            )
            .unwrap();

        let history = payload.conversation_state.history.as_ref().unwrap();
        match &history[0] {
            HistoryTurn::User { user_input_message } => {
                assert_eq!(user_input_message.content, "Be brief.\n\none");
            }
            _ => panic!("expected user turn first"),
        }
        assert_eq!(
            payload.conversation_state.current_message.user_input_message.content,
            "three"
        );
    }

    #[test]
    fn test_system_prompt_lands_on_current_when_no_history() {
        let payload = converter()
            .convert(
                &request(vec![system("Be brief."), user("Hi")], None),
                "m",
                "c".to_string(),
                None,
            )
            .unwrap();
        assert_eq!(
            payload.conversation_state.current_message.user_input_message.content,
            "Be brief.\n\nHi"
        );
    }

    #[test]
    fn test_zero_user_messages_system_prompt_becomes_current() {
        let payload = converter()
            .convert(&request(vec![system("Only a prompt.")], None), "m", "c".to_string(), None)
            .unwrap();
        assert_eq!(
            payload.conversation_state.current_message.user_input_message.content,
            "Only a prompt."
        );
    }

    #[test]
    fn test_empty_request_sends_continue() {
        let payload = converter()
            .convert(&request(vec![], None), "m", "c".to_string(), None)
            .unwrap();
        assert_eq!(
            payload.conversation_state.current_message.user_input_message.content,
            "Continue"
        );
    }

    #[test]
    fn test_assistant_last_moves_to_history() {
        let payload = converter()
            .convert(
                &request(vec![user("question"), assistant("partial answer")], None),
                "m",
                "c".to_string(),
                None,
            )
            .unwrap();

        let history = payload.conversation_state.history.as_ref().unwrap();
        assert_eq!(history.len(), 2);
        assert!(matches!(history[1], HistoryTurn::Assistant { .. }));
        assert_eq!(
            payload.conversation_state.current_message.user_input_message.content,
            "Continue"
        );
    }

    #[test]
    fn test_tool_result_message_becomes_current_user_turn() {
        let messages = vec![
            user("weather?"),
            ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(vec![OpenAiToolCall {
                    id: "call_1".to_string(),
                    function: OpenAiFunctionCall {
                        name: "get_weather".to_string(),
                        arguments: json!("{\"loc\":\"NYC\"}"),
                    },
                }]),
                tool_call_id: None,
            },
            ChatMessage {
                role: "tool".to_string(),
                content: Some(MessageContent::String("Sunny, 25C".to_string())),
                tool_calls: None,
                tool_call_id: Some("call_1".to_string()),
            },
        ];
        let payload = converter()
            .convert(&request(messages, Some(vec![weather_tool("short")])), "m", "c".to_string(), None)
            .unwrap();

        let current = &payload.conversation_state.current_message.user_input_message;
        let context = current.context.as_ref().unwrap();
        let results = context.tool_results.as_ref().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_use_id, "call_1");
        assert_eq!(results[0].content[0].text, "Sunny, 25C");
        assert_eq!(results[0].status, "success");

        let history = payload.conversation_state.history.as_ref().unwrap();
        match &history[1] {
            HistoryTurn::Assistant { assistant_response_message } => {
                let uses = assistant_response_message.tool_uses.as_ref().unwrap();
                assert_eq!(uses[0].name, "get_weather");
                assert_eq!(uses[0].input, json!({"loc":"NYC"}));
            }
            _ => panic!("expected assistant turn"),
        }
    }

    #[test]
    fn test_malformed_arguments_wrapped_raw() {
        let uses = convert_tool_calls(&[OpenAiToolCall {
            id: "c".to_string(),
            function: OpenAiFunctionCall {
                name: "t".to_string(),
                arguments: json!("not json at all"),
            },
        }]);
        assert_eq!(uses[0].input, json!({"raw": "not json at all"}));
    }

    #[test]
    fn test_oversized_description_reference_pattern_end_to_end() {
        let long = "x".repeat(10_001);
        let payload = converter()
            .convert(
                &request(
                    vec![system("Base prompt."), user("first"), assistant("ok"), user("go")],
                    Some(vec![weather_tool(&long)]),
                ),
                "m",
                "c".to_string(),
                None,
            )
            .unwrap();

        let current = &payload.conversation_state.current_message.user_input_message;
        let tools = current.context.as_ref().unwrap().tools.as_ref().unwrap();
        assert_eq!(
            tools[0].tool_specification.description,
            "[Full documentation in system prompt under '## Tool: get_weather']"
        );

        let history = payload.conversation_state.history.as_ref().unwrap();
        match &history[0] {
            HistoryTurn::User { user_input_message } => {
                let expected =
                    format!("Base prompt.\n\n## Tool: get_weather\n{}\n\nfirst", long);
                assert_eq!(user_input_message.content, expected);
            }
            _ => panic!("expected user turn first"),
        }
    }

    #[test]
    fn test_empty_history_content_placeholder() {
        let converter = converter();
        let history = converter.build_history(
            vec![turn("user", ""), turn("assistant", "")],
            "m",
        );
        match &history[0] {
            HistoryTurn::User { user_input_message } => {
                assert_eq!(user_input_message.content, "(empty)");
            }
            _ => panic!("expected user turn"),
        }
    }

    #[test]
    fn test_payload_serialization_shape() {
        let payload = converter()
            .convert(
                &request(vec![user("hello"), assistant("hi"), user("again")], None),
                "model-x",
                "conv-x".to_string(),
                Some("arn:p".to_string()),
            )
            .unwrap();

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["conversationState"]["chatTriggerType"], "MANUAL");
        assert_eq!(value["profileArn"], "arn:p");
        let history = value["conversationState"]["history"].as_array().unwrap();
        assert!(history[0].get("userInputMessage").is_some());
        assert!(history[1].get("assistantResponseMessage").is_some());
        assert_eq!(
            value["conversationState"]["currentMessage"]["userInputMessage"]["origin"],
            "AI_EDITOR"
        );
        // Empty contexts are omitted entirely.
        assert!(value["conversationState"]["currentMessage"]["userInputMessage"]
            .get("userInputMessageContext")
            .is_none());
    }

    #[test]
    fn test_unknown_role_is_conversion_error() {
        let messages = vec![ChatMessage {
            role: "moderator".to_string(),
            content: Some(MessageContent::String("hm".to_string())),
            tool_calls: None,
            tool_call_id: None,
        }];
        let result = converter().convert(&request(messages, None), "m", "c".to_string(), None);
        assert!(matches!(result, Err(ProxyError::Conversion(_))));
    }
}
