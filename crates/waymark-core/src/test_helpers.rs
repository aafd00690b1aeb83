//! Shorthands for scripting [`MockProvider`] in tests.
//!
//! Compiled for this crate's tests and, behind `test-utils`, for other
//! crates' tests.

use futures::StreamExt;
use serde_json::Value;

use crate::chat::{ChatResponse, ContentBlock, StopReason, ToolCall};
use crate::error::LlmError;
use crate::mock::MockProvider;
use crate::provider::ProviderMetadata;
use crate::stream::{ChatStream, StreamEvent};

/// A finished text-only response.
pub fn sample_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::Text(text.into())],
        stop_reason: StopReason::EndTurn,
        model: "test-model".into(),
    }
}

/// Stream events for a plain text answer split into `chunks`.
pub fn text_stream(chunks: &[&str]) -> Vec<StreamEvent> {
    let mut events: Vec<_> = chunks
        .iter()
        .map(|c| StreamEvent::TextDelta((*c).to_owned()))
        .collect();
    events.push(StreamEvent::Done {
        stop_reason: StopReason::EndTurn,
    });
    events
}

/// Stream events for a step that requests the given tool calls.
///
/// Each call is announced, its arguments streamed as one delta, and
/// completed, in order.
pub fn tool_call_stream(calls: &[(&str, &str, Value)]) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for (index, (id, name, arguments)) in (0u32..).zip(calls) {
        events.push(StreamEvent::ToolCallStart {
            index,
            id: (*id).to_owned(),
            name: (*name).to_owned(),
        });
        events.push(StreamEvent::ToolCallDelta {
            index,
            json_chunk: arguments.to_string(),
        });
        events.push(StreamEvent::ToolCallComplete {
            index,
            call: ToolCall {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                arguments: arguments.clone(),
            },
        });
    }
    events.push(StreamEvent::Done {
        stop_reason: StopReason::ToolUse,
    });
    events
}

/// Drains `stream`, keeping errors.
pub async fn collect_stream_results(stream: ChatStream) -> Vec<Result<StreamEvent, LlmError>> {
    stream.collect::<Vec<_>>().await
}

/// Drains `stream`.
///
/// # Panics
///
/// On the first error item.
pub async fn collect_stream(stream: ChatStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for item in collect_stream_results(stream).await {
        match item {
            Ok(event) => events.push(event),
            Err(e) => panic!("unexpected stream error: {e}"),
        }
    }
    events
}

/// An empty [`MockProvider`] reporting `provider_name` and `model`.
pub fn mock_for(provider_name: &str, model: &str) -> MockProvider {
    MockProvider::new(ProviderMetadata {
        name: provider_name.to_owned().into(),
        model: model.into(),
    })
}
