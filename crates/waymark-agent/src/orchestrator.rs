//! Server-side control loop for one assistant turn.
//!
//! [`Orchestrator::handle`] turns a message history into a stream of
//! [`TurnEvent`]s:
//!
//! ```text
//! start
//!   ├─ text-delta*                       (model text)
//!   ├─ tool-input-start                  (model begins a call)
//!   │    tool-input-delta*               (raw argument JSON)
//!   │    tool-input-available            (parsed arguments)
//!   ├─ tool-output-available | -error    (after validation, guard, dispatch)
//!   │    ... next model iteration ...
//!   └─ finish | error
//! ```
//!
//! Each model iteration streams one response. When it ends with tool
//! calls, the first call is validated and executed and any further calls
//! are refused; the results are appended to the conversation and the model
//! runs again. The number of iterations per turn is bounded.

use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use waymark_core::{
    ChatMessage, ChatParams, ChatRole, ChatStream, ContentBlock, DynProvider, LlmError, StreamEvent,
    ToolCall, ToolRegistry, ToolResult, TurnEvent,
};

use crate::guard::GuardMode;
use crate::policy::SYSTEM_POLICY;

/// Error text reported for every tool call after the first in one step.
pub const SINGLE_TOOL_REJECTION: &str = "Only one tool may be used per turn";

/// Error text for a call the model started but never finished.
pub const CUT_OFF_CALL: &str = "Tool call was cut off before its arguments completed";

/// A stream of turn events. Always ends with a terminal event.
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// One message of the client-supplied history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Who wrote it.
    pub role: ChatRole,
    /// Its text content.
    pub text: String,
}

impl HistoryMessage {
    /// A user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Per-turn limits and checks.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum model invocations in one turn.
    pub max_iterations: u32,
    /// How tool arguments are checked against the latest user message.
    pub guard: GuardMode,
    /// Sampling temperature passed to the model.
    pub temperature: Option<f32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            guard: GuardMode::default(),
            temperature: None,
        }
    }
}

/// Runs conversation turns against a model and a tool registry.
///
/// Stateless between turns; clone it or share it behind an `Arc`.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn DynProvider>,
    registry: ToolRegistry,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.metadata())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(
        provider: Arc<dyn DynProvider>,
        registry: ToolRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    /// Schema check, then argument guard, then dispatch.
    async fn run_call(&self, call: &ToolCall, latest_user_text: &str) -> ToolResult {
        if let Err(message) = self.registry.validate(call) {
            warn!(tool = %call.name, call_id = %call.id, %message, "invalid tool call");
            return ToolResult::error(&call.id, message);
        }
        if let Err(message) = self.config.guard.check(call, latest_user_text) {
            return ToolResult::error(&call.id, message);
        }
        self.registry.execute(call).await
    }

    /// Runs one turn over `history`.
    ///
    /// Messages without text are dropped and the usage policy is
    /// prepended. The returned stream starts with
    /// [`TurnEvent::Start`] and ends with [`TurnEvent::Finish`] or, when
    /// the model fails or the iteration limit is hit, [`TurnEvent::Error`].
    /// Tool failures are reported as [`TurnEvent::ToolOutputError`] and
    /// never end the turn.
    pub fn handle(&self, history: Vec<HistoryMessage>) -> TurnStream {
        let mut messages = vec![ChatMessage::system(SYSTEM_POLICY)];
        let mut latest_user_text = None;
        for message in history {
            if message.text.trim().is_empty() {
                continue;
            }
            if message.role == ChatRole::User {
                latest_user_text = Some(message.text.clone());
            }
            messages.push(ChatMessage {
                role: message.role,
                content: vec![ContentBlock::Text(message.text)],
            });
        }

        let message_id = format!("msg_{}", Uuid::new_v4().simple());
        let mut state = TurnState::new(self.clone(), messages, message_id.clone());
        state.pending.push_back(TurnEvent::Start { message_id });
        match latest_user_text {
            Some(text) => state.latest_user_text = text,
            None => {
                warn!("turn has no user message");
                state.pending.push_back(TurnEvent::Error {
                    error_text: "No user message to respond to".into(),
                });
                state.phase = Phase::Done;
            }
        }

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }
                match std::mem::replace(&mut state.phase, Phase::Done) {
                    Phase::Done => return None,
                    Phase::StartIteration => state.phase = state.start_iteration().await,
                    Phase::Streaming(stream) => state.phase = state.pull(stream).await,
                    Phase::ExecutingTools => state.phase = state.execute_tools().await,
                }
            }
        });
        Box::pin(stream)
    }
}

enum Phase {
    StartIteration,
    Streaming(ChatStream),
    ExecutingTools,
    /// Terminal; the stream ends once `pending` drains.
    Done,
}

struct TurnState {
    orchestrator: Orchestrator,
    params: ChatParams,
    message_id: String,
    latest_user_text: String,
    iterations: u32,
    /// Events produced but not yet yielded.
    pending: VecDeque<TurnEvent>,
    current_text: String,
    current_calls: Vec<ToolCall>,
    /// Stream index to call id and tool name, for every call announced in
    /// the current response.
    call_ids: BTreeMap<u32, (String, String)>,
    phase: Phase,
}

impl TurnState {
    fn new(orchestrator: Orchestrator, messages: Vec<ChatMessage>, message_id: String) -> Self {
        let definitions = orchestrator.registry.definitions();
        let has_tools = !definitions.is_empty();
        let params = ChatParams {
            messages,
            tools: has_tools.then_some(definitions),
            temperature: orchestrator.config.temperature,
        };
        Self {
            orchestrator,
            params,
            message_id,
            latest_user_text: String::new(),
            iterations: 0,
            pending: VecDeque::new(),
            current_text: String::new(),
            current_calls: Vec::new(),
            call_ids: BTreeMap::new(),
            phase: Phase::StartIteration,
        }
    }

    fn fail(&mut self, error: &LlmError) -> Phase {
        warn!(message_id = %self.message_id, error = %error, "turn ended by model failure");
        self.pending.push_back(TurnEvent::Error {
            error_text: error.to_string(),
        });
        Phase::Done
    }

    async fn start_iteration(&mut self) -> Phase {
        self.iterations += 1;
        let limit = self.orchestrator.config.max_iterations;
        if self.iterations > limit {
            return self.fail(&LlmError::IterationLimit { limit });
        }

        debug!(
            message_id = %self.message_id,
            iteration = self.iterations,
            messages = self.params.messages.len(),
            "starting model iteration"
        );
        match self.orchestrator.provider.stream_boxed(&self.params).await {
            Ok(stream) => {
                self.current_text.clear();
                self.current_calls.clear();
                self.call_ids.clear();
                Phase::Streaming(stream)
            }
            Err(e) => self.fail(&e),
        }
    }

    async fn pull(&mut self, mut stream: ChatStream) -> Phase {
        let event = match stream.next().await {
            Some(Ok(event)) => event,
            Some(Err(e)) => return self.fail(&e),
            None => return self.end_of_response(),
        };

        match event {
            StreamEvent::TextDelta(text) => {
                if !text.is_empty() {
                    self.current_text.push_str(&text);
                    self.pending.push_back(TurnEvent::TextDelta { text });
                }
            }
            StreamEvent::ToolCallStart { index, id, name } => {
                self.call_ids.insert(index, (id.clone(), name.clone()));
                self.pending.push_back(TurnEvent::ToolInputStart {
                    tool_call_id: id,
                    tool_name: name,
                });
            }
            StreamEvent::ToolCallDelta { index, json_chunk } => {
                if let Some((id, _)) = self.call_ids.get(&index) {
                    self.pending.push_back(TurnEvent::ToolInputDelta {
                        tool_call_id: id.clone(),
                        input_text_delta: json_chunk,
                    });
                }
            }
            StreamEvent::ToolCallComplete { call, .. } => {
                self.pending.push_back(TurnEvent::ToolInputAvailable {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    input: call.arguments.clone(),
                });
                self.current_calls.push(call);
            }
            StreamEvent::Done { .. } => return self.end_of_response(),
            _ => {}
        }
        Phase::Streaming(stream)
    }

    fn end_of_response(&mut self) -> Phase {
        self.resolve_cut_off_calls();
        if self.current_calls.is_empty() {
            self.pending.push_back(TurnEvent::Finish);
            Phase::Done
        } else {
            Phase::ExecutingTools
        }
    }

    /// Every announced call gets an outcome. A call whose arguments never
    /// completed is answered with an error and not run.
    fn resolve_cut_off_calls(&mut self) {
        for (id, name) in std::mem::take(&mut self.call_ids).into_values() {
            if self.current_calls.iter().any(|call| call.id == id) {
                continue;
            }
            warn!(tool = %name, call_id = %id, "tool call cut off before completion");
            self.pending.push_back(TurnEvent::ToolOutputError {
                tool_call_id: id,
                tool_name: Some(name),
                error_text: CUT_OFF_CALL.into(),
            });
        }
    }

    async fn execute_tools(&mut self) -> Phase {
        let calls = std::mem::take(&mut self.current_calls);

        let mut assistant_content = Vec::with_capacity(calls.len() + 1);
        if !self.current_text.is_empty() {
            assistant_content.push(ContentBlock::Text(std::mem::take(&mut self.current_text)));
        }
        assistant_content.extend(calls.iter().cloned().map(ContentBlock::ToolCall));
        self.params.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: assistant_content,
        });

        for (position, call) in calls.iter().enumerate() {
            let result = if position == 0 {
                self.orchestrator.run_call(call, &self.latest_user_text).await
            } else {
                warn!(tool = %call.name, call_id = %call.id, "refusing additional tool call");
                ToolResult::error(&call.id, SINGLE_TOOL_REJECTION)
            };

            self.pending.push_back(if result.is_error {
                TurnEvent::ToolOutputError {
                    tool_call_id: call.id.clone(),
                    tool_name: Some(call.name.clone()),
                    error_text: result.content_text(),
                }
            } else {
                TurnEvent::ToolOutputAvailable {
                    tool_call_id: call.id.clone(),
                    tool_name: Some(call.name.clone()),
                    output: result.content.clone(),
                }
            });
            self.params.messages.push(ChatMessage::tool_result(result));
        }

        Phase::StartIteration
    }
}
