//! Scripted provider for tests.
//!
//! [`MockProvider`] plays back whatever the test queued: whole responses
//! for `generate`, event sequences for `stream`, or failures for either.
//! Every request is recorded so tests can assert on what the model was
//! sent.
//!
//! ```rust,ignore
//! use waymark_core::test_helpers::{mock_for, text_stream};
//! use waymark_core::{ChatParams, Provider};
//!
//! # async fn example() {
//! let mock = mock_for("mock", "test-model");
//! mock.queue_stream(text_stream(&["Try ", "Ramen Nagi."]));
//!
//! let _events = mock.stream(&ChatParams::default()).await.unwrap();
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::chat::ChatResponse;
use crate::error::LlmError;
use crate::provider::{ChatParams, Provider, ProviderMetadata};
use crate::stream::{ChatStream, StreamEvent};

/// A failure to play back. [`LlmError`] is not `Clone`, so scripts hold
/// this instead and convert on delivery.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Becomes [`LlmError::Http`].
    Http {
        /// Status, if a response was "received".
        status: Option<http::StatusCode>,
        /// Failure text.
        message: String,
    },
    /// Becomes [`LlmError::Auth`].
    Auth(String),
    /// Becomes [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Becomes [`LlmError::ResponseFormat`].
    ResponseFormat(String),
    /// Becomes [`LlmError::Timeout`].
    Timeout {
        /// Reported elapsed time.
        elapsed_ms: u64,
    },
}

impl From<MockError> for LlmError {
    fn from(error: MockError) -> Self {
        match error {
            MockError::Http { status, message } => Self::Http { status, message },
            MockError::Auth(message) => Self::Auth(message),
            MockError::InvalidRequest(message) => Self::InvalidRequest(message),
            MockError::ResponseFormat(message) => Self::ResponseFormat {
                message,
                raw: String::new(),
            },
            MockError::Timeout { elapsed_ms } => Self::Timeout { elapsed_ms },
        }
    }
}

type StreamScript = Result<Vec<Result<StreamEvent, MockError>>, MockError>;

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<ChatResponse, MockError>>,
    streams: VecDeque<StreamScript>,
    calls: Vec<ChatParams>,
}

/// Provider that replays queued outcomes in FIFO order.
///
/// # Panics
///
/// `generate` and `stream` panic when their queue is empty: the test
/// made more model calls than it scripted.
pub struct MockProvider {
    meta: ProviderMetadata,
    script: Mutex<Script>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let script = self.script();
        f.debug_struct("MockProvider")
            .field("meta", &self.meta)
            .field("queued_responses", &script.responses.len())
            .field("queued_streams", &script.streams.len())
            .field("recorded_calls", &script.calls.len())
            .finish()
    }
}

impl MockProvider {
    /// A mock reporting `meta`, with nothing queued.
    pub fn new(meta: ProviderMetadata) -> Self {
        Self {
            meta,
            script: Mutex::default(),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a response for `generate`.
    pub fn queue_response(&self, response: ChatResponse) -> &Self {
        self.script().responses.push_back(Ok(response));
        self
    }

    /// Queues a failure for `generate`.
    pub fn queue_error(&self, error: MockError) -> &Self {
        self.script().responses.push_back(Err(error));
        self
    }

    /// Queues a successful event sequence for `stream`.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) -> &Self {
        self.queue_stream_results(events.into_iter().map(Ok).collect())
    }

    /// Queues a sequence that may fail part-way, like a dropped
    /// connection.
    pub fn queue_stream_results(&self, items: Vec<Result<StreamEvent, MockError>>) -> &Self {
        self.script().streams.push_back(Ok(items));
        self
    }

    /// Queues a failure of the `stream` call itself.
    pub fn queue_stream_error(&self, error: MockError) -> &Self {
        self.script().streams.push_back(Err(error));
        self
    }

    /// Every request received so far, oldest first.
    pub fn recorded_calls(&self) -> Vec<ChatParams> {
        self.script().calls.clone()
    }
}

impl Provider for MockProvider {
    async fn generate(&self, params: &ChatParams) -> Result<ChatResponse, LlmError> {
        let mut script = self.script();
        script.calls.push(params.clone());
        let Some(next) = script.responses.pop_front() else {
            panic!("MockProvider: generate called with no queued responses");
        };
        next.map_err(LlmError::from)
    }

    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        let next = {
            let mut script = self.script();
            script.calls.push(params.clone());
            script.streams.pop_front()
        };
        let Some(next) = next else {
            panic!("MockProvider: stream called with no queued streams");
        };
        let items: Vec<Result<StreamEvent, LlmError>> = next?
            .into_iter()
            .map(|item| item.map_err(LlmError::from))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn metadata(&self) -> ProviderMetadata {
        self.meta.clone()
    }
}
