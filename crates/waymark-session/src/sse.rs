//! Client for the `/api/chat` event stream.
//!
//! The server answers a chat request with `text/event-stream`; every
//! `data:` payload is one JSON [`TurnEvent`] and the stream ends with
//! `data: [DONE]`.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};
use waymark_core::TurnEvent;

use crate::error::{DecodeError, TransportError};
use crate::reducer::Role;

/// Path of the chat endpoint.
pub const CHAT_PATH: &str = "/api/chat";

/// Payload that ends the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Maximum bytes buffered while waiting for an event delimiter.
const MAX_SSE_BUFFER_SIZE: usize = 16 * 1024 * 1024;

const KNOWN_EVENT_TYPES: &[&str] = &[
    "start",
    "text-delta",
    "tool-input-start",
    "tool-input-delta",
    "tool-input-available",
    "tool-output-available",
    "tool-output-error",
    "finish",
    "error",
];

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Author.
    pub role: Role,
    /// Text content.
    pub text: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [WireMessage],
}

/// A decoded `data:` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A turn event.
    Event(TurnEvent),
    /// The end-of-stream marker.
    Done,
}

/// Decodes one `data:` payload.
///
/// Payloads with an unrecognised `type` are rejected with
/// [`DecodeError::UnknownEvent`] so callers can skip them.
pub fn decode_data(data: &str) -> Result<Frame, DecodeError> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(Frame::Done);
    }
    match serde_json::from_str::<TurnEvent>(data) {
        Ok(event) => Ok(Frame::Event(event)),
        Err(err) => {
            let tag = serde_json::from_str::<Value>(data)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_owned));
            match tag {
                Some(tag) if !KNOWN_EVENT_TYPES.contains(&tag.as_str()) => {
                    Err(DecodeError::UnknownEvent { tag })
                }
                _ => Err(DecodeError::Malformed(err.to_string())),
            }
        }
    }
}

/// Splits a byte stream into `data:` payloads.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    bytes: Vec<u8>,
}

impl SseBuffer {
    /// Appends `chunk` and returns the payloads of every event it
    /// completed. Multiple `data:` lines in one event are joined with
    /// `\n`; comments and other fields are ignored.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, TransportError> {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > MAX_SSE_BUFFER_SIZE {
            self.bytes.clear();
            return Err(TransportError::Protocol(format!(
                "event exceeds {MAX_SSE_BUFFER_SIZE} bytes"
            )));
        }

        let mut payloads = Vec::new();
        while let Some(end) = find_event_end(&self.bytes) {
            let block: Vec<u8> = self.bytes.drain(..end.0 + end.1).take(end.0).collect();
            let block = String::from_utf8_lossy(&block);
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        Ok(payloads)
    }
}

/// Position and length of the first blank-line delimiter.
fn find_event_end(bytes: &[u8]) -> Option<(usize, usize)> {
    let lf = bytes.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Turn events of one reply.
///
/// Unknown and malformed payloads are skipped with a warning. A transport
/// failure is yielded once and the stream ends.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<TurnEvent, TransportError>> + Send>>;

/// Posts conversations to a waymark server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// A client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    /// A client reusing `client`.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}{CHAT_PATH}", base_url.trim_end_matches('/')),
            client,
        }
    }

    /// Sends `history` and returns the reply's events.
    #[instrument(skip_all, fields(messages = history.len()))]
    pub async fn send(&self, history: &[WireMessage]) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { messages: history })
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .scan((SseBuffer::default(), false), |(buffer, failed), chunk| {
                if *failed {
                    return futures::future::ready(None);
                }
                let payloads = chunk
                    .map_err(|e| TransportError::Network(e.to_string()))
                    .and_then(|bytes| buffer.feed(&bytes));
                let items = match payloads {
                    Ok(payloads) => payloads.iter().filter_map(|p| frame_to_item(p)).collect(),
                    Err(e) => {
                        *failed = true;
                        vec![Err(e)]
                    }
                };
                futures::future::ready(Some(items))
            })
            .flat_map(futures::stream::iter);
        Ok(Box::pin(stream))
    }
}

fn frame_to_item(payload: &str) -> Option<Result<TurnEvent, TransportError>> {
    match decode_data(payload) {
        Ok(Frame::Event(event)) => Some(Ok(event)),
        Ok(Frame::Done) => None,
        Err(e) => {
            warn!(error = %e, "skipping event");
            None
        }
    }
}
