//! Mapping between waymark-core chat types and the Chat Completions wire
//! format.

use serde_json::Value;
use waymark_core::chat::{ChatMessage, ChatResponse, ChatRole, ContentBlock, StopReason, ToolCall};
use waymark_core::error::LlmError;
use waymark_core::provider::ChatParams;

use crate::config::OpenAiConfig;
use crate::types::{
    ApiError, Completion, CompletionRequest, FunctionSpec, ToolSpec, WireFunction, WireMessage,
    WireRole, WireToolCall,
};

/// Builds the request body for `params`.
///
/// When tools are offered, `parallel_tool_calls` is pinned to `false` so
/// the model proposes at most one call per step.
pub(crate) fn build_request<'a>(
    params: &'a ChatParams,
    config: &'a OpenAiConfig,
    stream: bool,
) -> CompletionRequest<'a> {
    let messages = params.messages.iter().map(to_wire).collect();

    let tools: Vec<ToolSpec<'a>> = params
        .tools
        .iter()
        .flatten()
        .map(|def| ToolSpec {
            function: FunctionSpec {
                name: &def.name,
                description: &def.description,
                parameters: def.parameters.as_value(),
            },
        })
        .collect();
    let parallel_tool_calls = (!tools.is_empty()).then_some(false);

    CompletionRequest {
        model: &config.model,
        messages,
        temperature: params.temperature,
        stream,
        tools,
        parallel_tool_calls,
    }
}

fn to_wire(msg: &ChatMessage) -> WireMessage {
    match msg.role {
        ChatRole::System => WireMessage::text(WireRole::System, msg.joined_text()),
        ChatRole::User => WireMessage::text(WireRole::User, msg.joined_text()),
        ChatRole::Assistant => {
            let text = msg.joined_text();
            WireMessage {
                role: WireRole::Assistant,
                content: (!text.is_empty()).then_some(text),
                tool_calls: msg
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolCall(call) => Some(WireToolCall {
                            id: call.id.clone(),
                            function: WireFunction {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        }),
                        _ => None,
                    })
                    .collect(),
                tool_call_id: None,
            }
        }
        ChatRole::Tool => {
            let result = msg.content.iter().find_map(|block| match block {
                ContentBlock::ToolResult(result) => Some(result),
                _ => None,
            });
            let Some(result) = result else {
                return WireMessage::text(WireRole::Tool, msg.joined_text());
            };
            WireMessage {
                tool_call_id: Some(result.tool_call_id.clone()),
                ..WireMessage::text(WireRole::Tool, result.content_text())
            }
        }
    }
}

/// Converts a non-streamed completion. Only the first choice is read.
pub(crate) fn from_completion(completion: Completion) -> ChatResponse {
    let Some(choice) = completion.choices.into_iter().next() else {
        return ChatResponse {
            content: Vec::new(),
            stop_reason: StopReason::EndTurn,
            model: completion.model,
        };
    };

    let text = choice
        .message
        .content
        .filter(|t| !t.is_empty())
        .map(ContentBlock::Text);
    let calls = choice.message.tool_calls.into_iter().map(|call| {
        ContentBlock::ToolCall(ToolCall {
            id: call.id,
            arguments: parse_arguments(&call.function.arguments),
            name: call.function.name,
        })
    });

    ChatResponse {
        content: text.into_iter().chain(calls).collect(),
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map_or(StopReason::EndTurn, stop_reason),
        model: completion.model,
    }
}

/// Parses a JSON-encoded argument string. Empty or malformed input
/// becomes an empty object, which then fails schema validation upstream
/// of dispatch.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

/// Maps a `finish_reason`.
pub(crate) fn stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        other => {
            tracing::warn!(finish_reason = other, "unexpected finish_reason");
            StopReason::EndTurn
        }
    }
}

/// Maps a non-success HTTP status and its body to an [`LlmError`].
pub(crate) fn http_error(status: http::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiError>(body)
        .map_or_else(|_| body.to_owned(), |e| e.error.message);

    match status {
        http::StatusCode::UNAUTHORIZED | http::StatusCode::FORBIDDEN => LlmError::Auth(message),
        http::StatusCode::BAD_REQUEST => LlmError::InvalidRequest(message),
        _ => LlmError::Http {
            status: Some(status),
            message,
        },
    }
}
