//! One chat session: conversation state, deduplicator and map together.

use tracing::{debug, warn};
use waymark_core::TurnEvent;

use crate::dedup::ResultDeduplicator;
use crate::error::{MapError, SessionError};
use crate::map::{MapSurface, MapSynchronizer, Reconciliation, RenderSummary};
use crate::reducer::{ConversationState, Message, Role, Status};
use crate::sse::WireMessage;
use crate::transcript;

/// Client-side state of one conversation.
///
/// Every handler takes `&mut self`, so events are applied one at a time
/// in arrival order.
pub struct Session<S: MapSurface> {
    state: ConversationState,
    dedup: ResultDeduplicator,
    map: MapSynchronizer<S>,
}

impl<S: MapSurface + std::fmt::Debug> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("dedup", &self.dedup)
            .field("map", &self.map)
            .finish()
    }
}

impl<S: MapSurface> Session<S> {
    /// Starts a session that owns `surface`.
    pub fn new(surface: S) -> Self {
        Self::with_synchronizer(MapSynchronizer::new(surface))
    }

    /// Starts a session around a configured synchronizer.
    pub fn with_synchronizer(map: MapSynchronizer<S>) -> Self {
        Self {
            state: ConversationState::new(),
            dedup: ResultDeduplicator::new(),
            map,
        }
    }

    /// The conversation so far.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// The map synchronizer.
    pub fn map(&self) -> &MapSynchronizer<S> {
        &self.map
    }

    /// Mutable access to the map synchronizer.
    pub fn map_mut(&mut self) -> &mut MapSynchronizer<S> {
        &mut self.map
    }

    /// Records a user message and returns the history to send with it:
    /// every prior message with text, ending with the new one.
    pub fn submit(&mut self, text: &str) -> Result<Vec<WireMessage>, SessionError> {
        self.state.submit_user(text)?;
        Ok(self
            .state
            .messages()
            .iter()
            .filter(|m| m.role != Role::System)
            .filter_map(|m| {
                let text = m.text();
                (!text.trim().is_empty()).then_some(WireMessage { role: m.role, text })
            })
            .collect())
    }

    /// Applies one streamed event and updates the map if the latest
    /// location result changed.
    pub fn apply(&mut self, event: TurnEvent) -> Result<Option<Reconciliation>, MapError> {
        self.state.apply(event);
        let Some(features) = self.dedup.inspect(&self.state) else {
            return Ok(None);
        };
        debug!(features = features.len(), "propagating location result");
        match self.map.reconcile(features) {
            Ok(reconciliation) => Ok(Some(reconciliation)),
            Err(e) => {
                warn!(error = %e, "map update failed, retrying on the next event");
                self.dedup.reset();
                Err(e)
            }
        }
    }

    /// Ends the in-flight reply with an error, as the server would.
    pub fn fail(&mut self, error_text: impl Into<String>) {
        let error_text = error_text.into();
        warn!(%error_text, "reply failed");
        self.state.apply(TurnEvent::Error { error_text });
    }

    /// Allows a new submission after a failed reply.
    pub fn clear_error(&mut self) {
        self.state.clear_error();
    }

    /// Forwards the map's style-ready notification.
    pub fn on_style_ready(&mut self) -> Result<Option<RenderSummary>, MapError> {
        self.map.on_style_ready()
    }

    /// Rendered segments for every message.
    pub fn transcript(&self) -> Vec<(&Message, Vec<String>)> {
        let messages = self.state.messages();
        let streaming = self.state.status() == Status::Streaming;
        messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let in_flight = streaming && i + 1 == messages.len();
                (m, transcript::render_message(m, in_flight))
            })
            .collect()
    }

    /// Releases the map. The session keeps its messages.
    pub fn dispose(&mut self) {
        self.map.dispose();
    }
}
