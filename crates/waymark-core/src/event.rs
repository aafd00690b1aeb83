//! UI-facing conversation events.
//!
//! A conversation turn is delivered to clients as an ordered sequence of
//! [`TurnEvent`]s, one per state transition. On the wire each event is a
//! JSON object tagged by `type`:
//!
//! ```json
//! {"type":"start","messageId":"msg_1"}
//! {"type":"text-delta","text":"Looking that up"}
//! {"type":"tool-input-available","toolCallId":"call_1","toolName":"search_location","input":{"query":"Merlion Park"}}
//! {"type":"tool-output-available","toolCallId":"call_1","toolName":"search_location","output":{"type":"FeatureCollection","features":[]}}
//! {"type":"finish"}
//! ```
//!
//! The set of events is closed. Deserializing an unknown `type` fails, so
//! decoders can reject it instead of guessing at its shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One state transition of an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TurnEvent {
    /// A new assistant message begins.
    Start {
        /// Identity of the assistant message every following event belongs to.
        message_id: String,
    },
    /// A fragment of generated text.
    TextDelta {
        /// The text to append.
        text: String,
    },
    /// The model started emitting a tool call.
    ToolInputStart {
        /// Identity linking the call to its input and output events.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
    },
    /// A raw JSON fragment of the tool arguments.
    ToolInputDelta {
        /// The call this fragment belongs to.
        tool_call_id: String,
        /// The argument text to append.
        input_text_delta: String,
    },
    /// The tool arguments are complete and parsed.
    ToolInputAvailable {
        /// The call whose input is complete.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Parsed arguments.
        input: Value,
    },
    /// The tool ran successfully.
    ToolOutputAvailable {
        /// The call this output answers.
        tool_call_id: String,
        /// The tool that produced the output, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// The tool's structured output.
        output: Value,
    },
    /// The tool failed or was refused.
    ToolOutputError {
        /// The call this error answers.
        tool_call_id: String,
        /// The tool that failed, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// Human-readable failure.
        error_text: String,
    },
    /// The turn completed normally.
    Finish,
    /// The model service failed; the turn ends here.
    Error {
        /// Human-readable failure.
        error_text: String,
    },
}

impl TurnEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_wire_shape() {
        let e = TurnEvent::Start {
            message_id: "msg_1".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({"type": "start", "messageId": "msg_1"})
        );
    }

    #[test]
    fn test_tool_input_delta_wire_shape() {
        let e = TurnEvent::ToolInputDelta {
            tool_call_id: "call_1".into(),
            input_text_delta: "{\"query\":".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({
                "type": "tool-input-delta",
                "toolCallId": "call_1",
                "inputTextDelta": "{\"query\":"
            })
        );
    }

    #[test]
    fn test_tool_output_omits_missing_name() {
        let e = TurnEvent::ToolOutputError {
            tool_call_id: "call_1".into(),
            tool_name: None,
            error_text: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({"type": "tool-output-error", "toolCallId": "call_1", "errorText": "boom"})
        );
    }

    #[test]
    fn test_finish_wire_shape() {
        assert_eq!(
            serde_json::to_value(TurnEvent::Finish).unwrap(),
            json!({"type": "finish"})
        );
    }

    #[test]
    fn test_decode_tool_output_available() {
        let e: TurnEvent = serde_json::from_value(json!({
            "type": "tool-output-available",
            "toolCallId": "call_9",
            "output": {"features": []}
        }))
        .unwrap();
        assert_eq!(
            e,
            TurnEvent::ToolOutputAvailable {
                tool_call_id: "call_9".into(),
                tool_name: None,
                output: json!({"features": []}),
            }
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = serde_json::from_value::<TurnEvent>(json!({"type": "reasoning-delta"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_is_terminal() {
        assert!(TurnEvent::Finish.is_terminal());
        assert!(
            TurnEvent::Error {
                error_text: "x".into()
            }
            .is_terminal()
        );
        assert!(!TurnEvent::TextDelta { text: "x".into() }.is_terminal());
    }
}
