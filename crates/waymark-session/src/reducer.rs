//! Folds turn events into a message history.
//!
//! [`ConversationState`] is a plain value updated by two operations:
//! [`submit_user`](ConversationState::submit_user) when the user sends a
//! message and [`apply`](ConversationState::apply) for every event of the
//! streamed reply. Tool parts follow a small state machine:
//!
//! ```text
//! tool-input-start      -> ToolCall   { input-streaming }
//! tool-input-available  -> ToolCall   { input-available }
//! tool-output-available -> ToolResult { output-available }   (replaces the call in place)
//! tool-output-error     -> ToolResult { output-error }       (replaces the call in place)
//! ```
//!
//! Results are matched to calls by call id, never by position.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use waymark_core::TurnEvent;

use crate::error::SessionError;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The model.
    Assistant,
    /// Instructions; never produced by the reducer.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        })
    }
}

/// Whether the conversation can accept a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Idle.
    #[default]
    Ready,
    /// A reply is in flight.
    Streaming,
    /// The last reply failed.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Streaming => "streaming",
            Self::Error => "error",
        })
    }
}

/// Progress of a tool call's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Argument text is still arriving.
    InputStreaming,
    /// Arguments are complete.
    InputAvailable,
}

/// How a tool call resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool's output.
    OutputAvailable(Value),
    /// Why the tool failed.
    OutputError(String),
}

/// One piece of a message, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Generated text.
    Text {
        /// The text so far.
        text: String,
    },
    /// A tool call awaiting its result.
    ToolCall {
        /// Call identity.
        call_id: String,
        /// Tool being called.
        tool_name: String,
        /// Raw argument text received so far.
        input_text: String,
        /// Parsed arguments, `Null` until available.
        input: Value,
        /// Argument progress.
        state: CallState,
    },
    /// A resolved tool call.
    ToolResult {
        /// Call identity.
        call_id: String,
        /// Tool that ran; empty when the result arrived without a call.
        tool_name: String,
        /// Arguments the tool ran with.
        input: Value,
        /// Output or error.
        outcome: ToolOutcome,
    },
}

impl Part {
    fn call_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::ToolCall { call_id, .. } | Self::ToolResult { call_id, .. } => Some(call_id),
        }
    }

    /// The output of a successful result for `tool`.
    pub fn output_of(&self, tool: &str) -> Option<&Value> {
        match self {
            Self::ToolResult {
                tool_name,
                outcome: ToolOutcome::OutputAvailable(output),
                ..
            } if tool_name == tool => Some(output),
            _ => None,
        }
    }
}

/// A message and its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message identity.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Parts in emission order.
    pub parts: Vec<Part>,
}

impl Message {
    /// All text parts concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// The message history of one session and its status.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    status: Status,
    last_error: Option<String>,
}

impl ConversationState {
    /// An empty, ready conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Text of the error that ended the last reply, while in [`Status::Error`].
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Appends a user message and marks the conversation as streaming.
    pub fn submit_user(&mut self, text: &str) -> Result<&Message, SessionError> {
        if self.status != Status::Ready {
            return Err(SessionError::NotReady {
                status: self.status,
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.messages.push(Message {
            id: format!("user_{}", Uuid::new_v4().simple()),
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        });
        self.status = Status::Streaming;
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Leaves [`Status::Error`] so the user can try again. Messages,
    /// including partial text of the failed reply, are kept.
    pub fn clear_error(&mut self) {
        if self.status == Status::Error {
            self.status = Status::Ready;
            self.last_error = None;
        }
    }

    /// Folds one event into the state.
    ///
    /// Events arriving after an error are ignored.
    pub fn apply(&mut self, event: TurnEvent) {
        if self.status == Status::Error {
            debug!(?event, "ignoring event after error");
            return;
        }
        match event {
            TurnEvent::Start { message_id } => {
                self.messages.push(Message {
                    id: message_id,
                    role: Role::Assistant,
                    parts: Vec::new(),
                });
                self.status = Status::Streaming;
            }
            TurnEvent::TextDelta { text } => {
                let parts = self.current_parts();
                match parts.last_mut() {
                    Some(Part::Text { text: existing }) => existing.push_str(&text),
                    _ => parts.push(Part::Text { text }),
                }
            }
            TurnEvent::ToolInputStart {
                tool_call_id,
                tool_name,
            } => self.current_parts().push(Part::ToolCall {
                call_id: tool_call_id,
                tool_name,
                input_text: String::new(),
                input: Value::Null,
                state: CallState::InputStreaming,
            }),
            TurnEvent::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => match self.find_part(&tool_call_id) {
                Some(Part::ToolCall {
                    input_text,
                    state: CallState::InputStreaming,
                    ..
                }) => input_text.push_str(&input_text_delta),
                _ => debug!(call_id = %tool_call_id, "argument delta for unknown call"),
            },
            TurnEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => match self.find_part(&tool_call_id) {
                Some(Part::ToolCall {
                    input: existing,
                    state,
                    ..
                }) => {
                    *existing = input;
                    *state = CallState::InputAvailable;
                }
                Some(Part::ToolResult { .. }) => {
                    debug!(call_id = %tool_call_id, "arguments for an already resolved call");
                }
                _ => self.current_parts().push(Part::ToolCall {
                    input_text: input.to_string(),
                    call_id: tool_call_id,
                    tool_name,
                    input,
                    state: CallState::InputAvailable,
                }),
            },
            TurnEvent::ToolOutputAvailable {
                tool_call_id,
                tool_name,
                output,
            } => self.resolve(tool_call_id, tool_name, ToolOutcome::OutputAvailable(output)),
            TurnEvent::ToolOutputError {
                tool_call_id,
                tool_name,
                error_text,
            } => self.resolve(tool_call_id, tool_name, ToolOutcome::OutputError(error_text)),
            TurnEvent::Finish => self.status = Status::Ready,
            TurnEvent::Error { error_text } => {
                self.status = Status::Error;
                self.last_error = Some(error_text);
            }
        }
    }

    /// Parts of the in-flight assistant message, created if the reply
    /// started without a `start` event.
    fn current_parts(&mut self) -> &mut Vec<Part> {
        let needs_message = self
            .messages
            .last()
            .is_none_or(|m| m.role != Role::Assistant);
        if needs_message {
            self.messages.push(Message {
                id: format!("msg_{}", Uuid::new_v4().simple()),
                role: Role::Assistant,
                parts: Vec::new(),
            });
            self.status = Status::Streaming;
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last].parts
    }

    /// The call or result part with this id, searching newest first.
    fn find_part(&mut self, call_id: &str) -> Option<&mut Part> {
        self.messages
            .iter_mut()
            .rev()
            .flat_map(|m| m.parts.iter_mut())
            .find(|p| p.call_id() == Some(call_id))
    }

    fn resolve(&mut self, call_id: String, tool_name: Option<String>, outcome: ToolOutcome) {
        if let Some(part) = self.find_part(&call_id) {
            let (known_name, input) = match part {
                Part::ToolCall {
                    tool_name: name,
                    input,
                    ..
                }
                | Part::ToolResult {
                    tool_name: name,
                    input,
                    ..
                } => (std::mem::take(name), std::mem::take(input)),
                Part::Text { .. } => (String::new(), Value::Null),
            };
            *part = Part::ToolResult {
                call_id,
                tool_name: if known_name.is_empty() {
                    tool_name.unwrap_or_default()
                } else {
                    known_name
                },
                input,
                outcome,
            };
            return;
        }

        debug!(call_id = %call_id, "result for unknown call");
        self.current_parts().push(Part::ToolResult {
            call_id,
            tool_name: tool_name.unwrap_or_default(),
            input: Value::Null,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(id: &str) -> TurnEvent {
        TurnEvent::Start {
            message_id: id.into(),
        }
    }

    fn text(t: &str) -> TurnEvent {
        TurnEvent::TextDelta { text: t.into() }
    }

    fn input_start(id: &str) -> TurnEvent {
        TurnEvent::ToolInputStart {
            tool_call_id: id.into(),
            tool_name: "search_location".into(),
        }
    }

    fn input_available(id: &str, query: &str) -> TurnEvent {
        TurnEvent::ToolInputAvailable {
            tool_call_id: id.into(),
            tool_name: "search_location".into(),
            input: json!({ "query": query }),
        }
    }

    fn output(id: &str, output: Value) -> TurnEvent {
        TurnEvent::ToolOutputAvailable {
            tool_call_id: id.into(),
            tool_name: None,
            output,
        }
    }

    fn streaming_state() -> ConversationState {
        let mut state = ConversationState::new();
        state.submit_user("Where is Merlion Park").unwrap();
        state.apply(start("msg_1"));
        state
    }

    #[test]
    fn test_submit_flips_to_streaming() {
        let mut state = ConversationState::new();
        let message = state.submit_user("  hello ").unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.text(), "hello");
        assert_eq!(state.status(), Status::Streaming);
    }

    #[test]
    fn test_submit_rejected_while_streaming() {
        let mut state = streaming_state();
        assert_eq!(
            state.submit_user("again").unwrap_err(),
            SessionError::NotReady {
                status: Status::Streaming
            }
        );
    }

    #[test]
    fn test_submit_empty_rejected() {
        let mut state = ConversationState::new();
        assert_eq!(
            state.submit_user("   ").unwrap_err(),
            SessionError::EmptyMessage
        );
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_text_deltas_merge_into_trailing_part() {
        let mut state = streaming_state();
        state.apply(text("Merlion "));
        state.apply(text("Park"));
        state.apply(TurnEvent::Finish);

        let reply = &state.messages()[1];
        assert_eq!(reply.id, "msg_1");
        assert_eq!(
            reply.parts,
            vec![Part::Text {
                text: "Merlion Park".into()
            }]
        );
        assert_eq!(state.status(), Status::Ready);
    }

    #[test]
    fn test_tool_call_lifecycle_in_place() {
        let mut state = streaming_state();
        state.apply(text("Looking."));
        state.apply(input_start("call_1"));
        state.apply(TurnEvent::ToolInputDelta {
            tool_call_id: "call_1".into(),
            input_text_delta: "{\"query\":".into(),
        });

        assert!(matches!(
            &state.messages()[1].parts[1],
            Part::ToolCall { state: CallState::InputStreaming, input_text, .. } if input_text == "{\"query\":"
        ));

        state.apply(input_available("call_1", "Merlion Park"));
        state.apply(output("call_1", json!({"features": []})));
        state.apply(text("Found it."));

        let parts = &state.messages()[1].parts;
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[1],
            Part::ToolResult {
                call_id: "call_1".into(),
                tool_name: "search_location".into(),
                input: json!({"query": "Merlion Park"}),
                outcome: ToolOutcome::OutputAvailable(json!({"features": []})),
            }
        );
        assert!(matches!(&parts[2], Part::Text { text } if text == "Found it."));
    }

    #[test]
    fn test_results_matched_by_id_not_position() {
        let mut state = streaming_state();
        state.apply(input_start("call_a"));
        state.apply(input_start("call_b"));
        state.apply(TurnEvent::ToolOutputError {
            tool_call_id: "call_b".into(),
            tool_name: Some("search_location".into()),
            error_text: "Only one tool may be used per turn".into(),
        });
        state.apply(output("call_a", json!({"features": []})));

        let parts = &state.messages()[1].parts;
        assert!(matches!(&parts[0], Part::ToolResult { call_id, outcome: ToolOutcome::OutputAvailable(_), .. } if call_id == "call_a"));
        assert!(matches!(&parts[1], Part::ToolResult { call_id, outcome: ToolOutcome::OutputError(_), .. } if call_id == "call_b"));
    }

    #[test]
    fn test_result_for_unknown_call_appended() {
        let mut state = streaming_state();
        state.apply(text("Hi"));
        state.apply(TurnEvent::ToolOutputAvailable {
            tool_call_id: "ghost".into(),
            tool_name: Some("get_review_rating".into()),
            output: json!({"success": false}),
        });

        let parts = &state.messages()[1].parts;
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[1], Part::ToolResult { tool_name, input: Value::Null, .. } if tool_name == "get_review_rating"));
    }

    #[test]
    fn test_input_available_without_start() {
        let mut state = streaming_state();
        state.apply(input_available("call_1", "Jewel"));
        assert!(matches!(
            &state.messages()[1].parts[0],
            Part::ToolCall { state: CallState::InputAvailable, input, .. } if input["query"] == "Jewel"
        ));
    }

    #[test]
    fn test_error_freezes_and_keeps_text() {
        let mut state = streaming_state();
        state.apply(text("Merlion Park is"));
        state.apply(TurnEvent::Error {
            error_text: "HTTP error: connection reset".into(),
        });
        state.apply(text(" ignored"));
        state.apply(TurnEvent::Finish);

        assert_eq!(state.status(), Status::Error);
        assert_eq!(state.last_error(), Some("HTTP error: connection reset"));
        assert_eq!(state.messages()[1].text(), "Merlion Park is");
        assert!(state.submit_user("retry").is_err());

        state.clear_error();
        assert_eq!(state.status(), Status::Ready);
        assert!(state.submit_user("retry").is_ok());
    }

    #[test]
    fn test_text_without_start_creates_message() {
        let mut state = ConversationState::new();
        state.submit_user("hi").unwrap();
        state.apply(text("Hello"));
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1].role, Role::Assistant);
    }
}
