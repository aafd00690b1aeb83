//! Streamed completion decoding.
//!
//! Turns the `text/event-stream` body of a streamed completion into a
//! [`ChatStream`]. Bytes are buffered until they form whole UTF-8 text
//! and whole events; tool-call fragments are assembled per call index and
//! released as [`StreamEvent::ToolCallComplete`] once the model finishes.

use std::collections::BTreeMap;

use futures::stream::StreamExt;
use waymark_core::chat::{StopReason, ToolCall};
use waymark_core::error::LlmError;
use waymark_core::stream::{ChatStream, StreamEvent};

use crate::convert::{parse_arguments, stop_reason};
use crate::types::{Chunk, DeltaToolCall};

/// Upper bound on undecoded bytes plus undelivered text.
const BUFFER_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Incremental decoder for one response body.
#[derive(Debug, Default)]
struct ChunkDecoder {
    text: String,
    pending_bytes: Vec<u8>,
    calls: BTreeMap<u32, PartialCall>,
}

impl ChunkDecoder {
    /// Feeds raw body bytes and returns the events they complete.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, LlmError>> {
        self.pending_bytes.extend_from_slice(bytes);
        if self.pending_bytes.len() + self.text.len() > BUFFER_LIMIT {
            self.pending_bytes.clear();
            self.text.clear();
            return vec![Err(LlmError::ResponseFormat {
                message: "SSE stream buffer exceeded 16 MiB".into(),
                raw: String::new(),
            })];
        }
        self.decode_utf8();

        let mut events = Vec::new();
        while let Some(end) = self.text.find("\n\n") {
            let block: String = self.text.drain(..end + 2).collect();
            if let Some(data) = data_payload(&block) {
                events.extend(self.on_data(data).into_iter().map(Ok));
            }
        }
        events
    }

    /// Moves the longest valid UTF-8 prefix of `pending_bytes` into
    /// `text`. A truncated trailing sequence stays pending; invalid bytes
    /// are dropped.
    fn decode_utf8(&mut self) {
        let valid = match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                self.text.push_str(text);
                self.pending_bytes.clear();
                return;
            }
            Err(e) => e,
        };
        let good = valid.valid_up_to();
        if let Ok(text) = std::str::from_utf8(&self.pending_bytes[..good]) {
            self.text.push_str(text);
        }
        self.pending_bytes
            .drain(..good + valid.error_len().unwrap_or(0));
    }

    fn on_data(&mut self, data: &str) -> Vec<StreamEvent> {
        if data == "[DONE]" {
            return self.finish_calls();
        }
        let Ok(chunk) = serde_json::from_str::<Chunk>(data) else {
            tracing::debug!(data, "skipping unparseable chunk");
            return Vec::new();
        };
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta(text));
        }
        for fragment in choice.delta.tool_calls {
            self.on_call_fragment(fragment, &mut events);
        }
        if let Some(reason) = choice.finish_reason {
            let stop_reason = stop_reason(&reason);
            if stop_reason == StopReason::ToolUse {
                events.extend(self.finish_calls());
            }
            events.push(StreamEvent::Done { stop_reason });
        }
        events
    }

    fn on_call_fragment(&mut self, fragment: DeltaToolCall, events: &mut Vec<StreamEvent>) {
        let index = fragment.index;
        if let Some(id) = fragment.id {
            let name = fragment.function.name.unwrap_or_default();
            events.push(StreamEvent::ToolCallStart {
                index,
                id: id.clone(),
                name: name.clone(),
            });
            self.calls.insert(
                index,
                PartialCall {
                    id,
                    name,
                    arguments: String::new(),
                },
            );
        }

        let Some(json_chunk) = fragment.function.arguments.filter(|a| !a.is_empty()) else {
            return;
        };
        if let Some(call) = self.calls.get_mut(&index) {
            call.arguments.push_str(&json_chunk);
        }
        events.push(StreamEvent::ToolCallDelta { index, json_chunk });
    }

    /// Releases every assembled call, in index order.
    fn finish_calls(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .map(|(index, call)| StreamEvent::ToolCallComplete {
                index,
                call: ToolCall {
                    arguments: parse_arguments(&call.arguments),
                    id: call.id,
                    name: call.name,
                },
            })
            .collect()
    }
}

/// The payload of the first `data:` line of an event block.
fn data_payload(block: &str) -> Option<&str> {
    block.lines().find_map(|line| {
        let line = line.trim_end_matches('\r');
        line.strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
    })
}

/// Wraps a streaming response body as a [`ChatStream`].
pub(crate) fn into_stream(response: reqwest::Response) -> ChatStream {
    let stream = response
        .bytes_stream()
        .scan(ChunkDecoder::default(), |decoder, chunk| {
            let items = match chunk {
                Ok(bytes) => decoder.feed(&bytes),
                Err(e) => vec![Err(LlmError::Http {
                    status: None,
                    message: format!("Stream read error: {e}"),
                })],
            };
            futures::future::ready(Some(items))
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}
