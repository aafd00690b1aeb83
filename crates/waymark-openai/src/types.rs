//! Chat Completions wire types, crate-private.
//!
//! Tool calls share one shape in both directions; everything else is
//! split into what waymark sends and what it reads back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec<'a>>,
    /// Set to `false` whenever tools are offered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WireRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One outgoing conversation message.
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    pub role: WireRole,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    pub fn text(role: WireRole, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A function call, as the assistant emitted it and as it is echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "function")]
pub(crate) struct WireToolCall {
    pub id: String,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireFunction {
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// A function offered to the model.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "function")]
pub(crate) struct ToolSpec<'a> {
    pub function: FunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FunctionSpec<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: &'a Value,
}

/// A complete, non-streamed completion.
#[derive(Debug, Deserialize)]
pub(crate) struct Completion {
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCall>,
}

/// `{"error": {"message": ...}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
pub(crate) struct Chunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Delta {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<DeltaToolCall>,
}

/// A fragment of a streamed tool call. Only the first fragment of a call
/// carries `id` and `function.name`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeltaToolCall {
    pub index: u32,
    pub id: Option<String>,
    #[serde(default)]
    pub function: DeltaFunction,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeltaFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}
