//! Messages, content blocks, tool calls, and responses.
//!
//! A conversation sent to a model is a list of [`ChatMessage`]s. Each
//! message carries a [`ChatRole`] and one or more [`ContentBlock`]s, so a
//! single assistant turn can hold text alongside the tool calls the model
//! decided to make.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that steer the model.
    System,
    /// The human side of the conversation.
    User,
    /// The model.
    Assistant,
    /// The output of a tool invocation fed back to the model.
    Tool,
}

/// A single typed fragment of a [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// A tool the model asked to invoke.
    ToolCall(ToolCall),
    /// The result of a tool invocation.
    ToolResult(ToolResult),
}

/// A request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned identifier linking the call to its result.
    pub id: String,
    /// The tool's registered name.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Value,
}

/// The outcome of executing a [`ToolCall`].
///
/// `content` is structured JSON. Providers that only accept text render
/// it with [`ToolResult::content_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result answers.
    pub tool_call_id: String,
    /// The tool output, or the error message when `is_error` is set.
    pub content: Value,
    /// Whether the tool failed.
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result carrying `content`.
    pub fn success(tool_call_id: impl Into<String>, content: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content,
            is_error: false,
        }
    }

    /// A failed result carrying a human-readable message.
    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: Value::String(message.into()),
            is_error: true,
        }
    }

    /// Renders the content as text for providers that take string tool
    /// results. Bare strings are passed through without JSON quoting.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    fn text(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// A system message with a single text block.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(ChatRole::System, text)
    }

    /// A user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(ChatRole::User, text)
    }

    /// An assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, text)
    }

    /// A tool message wrapping `result`.
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: ChatRole::Tool,
            content: vec![ContentBlock::ToolResult(result)],
        }
    }

    /// Concatenated text of every [`ContentBlock::Text`] block.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its turn.
    EndTurn,
    /// The model wants tool results before continuing.
    ToolUse,
    /// The token limit was hit.
    MaxTokens,
}

/// A complete, non-streamed model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// The model that produced the response.
    pub model: String,
}

impl ChatResponse {
    /// The first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// Every tool call in the response, in order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolCall(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}
