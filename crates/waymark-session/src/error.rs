//! Error types for the client side.

use crate::map::MarkerId;
use crate::reducer::Status;

/// Rejected conversation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// A message was submitted while a turn is in flight or failed.
    #[error("cannot submit while the conversation is {status}")]
    NotReady {
        /// The status at the time of submission.
        status: Status,
    },
    /// The message has no text.
    #[error("message is empty")]
    EmptyMessage,
}

/// Failures reported by a [`MapSurface`](crate::map::MapSurface).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MapError {
    /// The map handle has been released.
    #[error("map has been released")]
    Released,
    /// The marker is no longer attached to the map.
    #[error("marker {0} is not attached")]
    MarkerDetached(MarkerId),
    /// Any other failure of the underlying map.
    #[error("map error: {0}")]
    Surface(String),
}

/// A `data:` payload that is not a turn event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Well-formed JSON with a `type` this client does not know.
    #[error("unknown event type {tag:?}")]
    UnknownEvent {
        /// The unrecognised tag.
        tag: String,
    },
    /// Not a turn event at all.
    #[error("malformed event: {0}")]
    Malformed(String),
}

/// Failures talking to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The endpoint answered with a non-success status.
    #[error("chat endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The connection failed or dropped.
    #[error("network error: {0}")]
    Network(String),
    /// The response is not a well-formed event stream.
    #[error("protocol error: {0}")]
    Protocol(String),
}
