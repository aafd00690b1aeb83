//! Streamed model output.
//!
//! A backend yields [`StreamEvent`]s: text as it is generated, each tool
//! call in three steps (`ToolCallStart`, any number of
//! `ToolCallDelta` argument fragments, then `ToolCallComplete` with the
//! parsed call), and a final `Done`. `index` ties the steps of one call
//! together when a step proposes several.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::chat::{StopReason, ToolCall};
use crate::error::LlmError;

/// Streamed model output. An `Err` item ends the stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// One increment of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StreamEvent {
    /// Generated text.
    TextDelta(String),
    /// A tool call begins.
    ToolCallStart {
        /// Position of the call within the step.
        index: u32,
        /// Backend-assigned call id.
        id: String,
        /// Requested tool.
        name: String,
    },
    /// Raw argument JSON, in generation order.
    ToolCallDelta {
        /// Call this fragment extends.
        index: u32,
        /// The fragment.
        json_chunk: String,
    },
    /// Arguments are complete.
    ToolCallComplete {
        /// Call being completed.
        index: u32,
        /// The call with parsed arguments.
        call: ToolCall,
    },
    /// The model stopped.
    Done {
        /// Why.
        stop_reason: StopReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_done_serde() {
        let done = StreamEvent::Done {
            stop_reason: StopReason::ToolUse,
        };
        let back: StreamEvent =
            serde_json::from_str(&serde_json::to_string(&done).unwrap()).unwrap();
        assert_eq!(back, done);
    }

    #[tokio::test]
    async fn test_error_item_follows_partial_output() {
        let stream: ChatStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::TextDelta("partial".into())),
            Err(LlmError::Timeout { elapsed_ms: 100 }),
        ]));
        let items: Vec<_> = stream.collect().await;
        assert_eq!(
            items[0].as_ref().unwrap(),
            &StreamEvent::TextDelta("partial".into())
        );
        assert!(matches!(items[1], Err(LlmError::Timeout { .. })));
    }
}
