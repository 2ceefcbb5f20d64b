//! Chat-completion wire types for both sides of the gateway.
//!
//! Client-facing types follow the OpenAI chat-completion API; upstream types
//! follow the DeepSeek dialect of the same API. The two share message and
//! tool shapes, and differ in model naming, legacy `functions` support and
//! how `tool_choice` may be expressed.

use serde::{Deserialize, Deserializer, Serialize};

/// The only model name the gateway advertises to clients.
pub const CLIENT_MODEL: &str = "gpt-4o";

/// Object tag written on every translated non-streaming response.
pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";

// =============================================================================
// Tool Calling Types
// =============================================================================

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool type - always "function".
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    /// Function definition.
    pub function: Function,
}

impl Tool {
    /// Wrap a function declaration as a `function` tool.
    pub fn function(function: Function) -> Self {
        Self {
            kind: function_type(),
            function,
        }
    }
}

/// Function declaration (also the legacy `functions[]` entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Description of what the function does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for function parameters, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Any other declaration keys (e.g. `strict`), forwarded as received.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Tool type - "function" for every call the gateway emits upstream.
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    /// Function call details.
    pub function: ToolCallFunction,
}

/// Function call details within a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Name of the function to call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// JSON-encoded arguments, kept as an opaque string.
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Client tool-choice, reduced to the shapes the upstream can act on.
///
/// Deserializes from any JSON value: `"auto"`, `"none"`, and objects tagged
/// `{"type": "function", ...}` are recognised; everything else (including
/// `null`, `"required"` and malformed objects) is `Absent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<serde_json::Value>")]
pub enum ToolChoice {
    #[default]
    Absent,
    Auto,
    None,
    /// The client asked for one specific function.
    FunctionHint,
}

impl From<Option<serde_json::Value>> for ToolChoice {
    fn from(value: Option<serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::String(s)) => match s.as_str() {
                "auto" => Self::Auto,
                "none" => Self::None,
                _ => Self::Absent,
            },
            Some(serde_json::Value::Object(map))
                if map.get("type").and_then(serde_json::Value::as_str) == Some("function") =>
            {
                Self::FunctionHint
            }
            _ => Self::Absent,
        }
    }
}

/// Tool choice as the upstream accepts it: a bare enum string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamToolChoice {
    Auto,
    None,
}

// =============================================================================
// Messages
// =============================================================================

/// A single chat message, shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant", "tool" (or legacy "function").
    pub role: String,
    /// Text content. `null` and a missing field both read as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Tool calls made by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call this message answers (role="tool" only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Function or participant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Whether this message carries at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// Read an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Chat Completion Request Types
// =============================================================================

/// Inbound request to `/v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatRequest {
    /// Model name requested by the client.
    pub model: String,
    /// Conversation so far, in order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Whether to stream the response.
    #[serde(default)]
    pub stream: bool,
    /// Legacy function declarations.
    #[serde(default)]
    pub functions: Option<Vec<Function>>,
    /// Tool definitions for function calling.
    #[serde(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Translated request sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamRequest {
    /// Always the active profile's model.
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<UpstreamToolChoice>,
}

// =============================================================================
// Chat Completion Response Types
// =============================================================================

/// Non-streaming chat completion, as received upstream and as re-emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<ChatChoice>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Usage,
}

/// A single chat completion choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Response from `/v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    /// The static model list: the advertised client model and the upstream family.
    pub fn advertised(created: i64) -> Self {
        Self {
            object: "list".to_string(),
            data: vec![
                ModelInfo::new(CLIENT_MODEL, "openai", created),
                ModelInfo::new("deepseek-chat", "deepseek", created),
            ],
        }
    }
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelInfo {
    fn new(id: &str, owned_by: &str, created: i64) -> Self {
        Self {
            id: id.to_string(),
            object: "model".to_string(),
            created,
            owned_by: owned_by.to_string(),
        }
    }
}
