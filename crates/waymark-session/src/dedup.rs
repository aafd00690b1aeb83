//! Decides when a location result should reach the map.

use tracing::debug;
use waymark_places::{FeatureCollection, LocationFeature};

use crate::reducer::{ConversationState, Role};
use crate::{LOCATION_TOOL, MAX_MAP_FEATURES};

/// Suppresses repeated propagation of the same location result.
///
/// A result is identified by its message id and its serialized output.
/// The reducer re-derives the latest message after every event, so the
/// same output is seen many times while the rest of the reply streams in;
/// only the first sighting is propagated.
#[derive(Debug, Default)]
pub struct ResultDeduplicator {
    last_fingerprint: Option<(String, String)>,
    /// Whether the map may be showing features.
    showing_features: bool,
}

impl ResultDeduplicator {
    /// Creates a deduplicator that has propagated nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets what was propagated, so the next inspection propagates the
    /// latest result again. Used when the map could not apply it.
    pub fn reset(&mut self) {
        self.last_fingerprint = None;
        self.showing_features = true;
    }

    /// Inspects the latest message and returns the features to show, if
    /// they should be propagated now. At most 10 features are returned.
    pub fn inspect(&mut self, state: &ConversationState) -> Option<Vec<LocationFeature>> {
        let message = state.messages().last()?;
        if message.role != Role::Assistant {
            return None;
        }
        let output = message.parts.iter().find_map(|p| {
            p.output_of(LOCATION_TOOL)
                .filter(|output| output.get("features").is_some_and(|f| f.is_array()))
        })?;

        let fingerprint = (message.id.clone(), output.to_string());
        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            return None;
        }
        self.last_fingerprint = Some(fingerprint);

        let mut features = FeatureCollection::features_from_output(output)?;
        if features.is_empty() && !self.showing_features {
            debug!(message_id = %message.id, "empty result after empty result");
            return None;
        }
        features.truncate(MAX_MAP_FEATURES);
        self.showing_features = !features.is_empty();
        Some(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use waymark_core::TurnEvent;

    fn point(name: &str, lng: f64) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [lng, 1.3]},
            "properties": {"name": name}
        })
    }

    fn state_with_output(message_id: &str, output: Value) -> ConversationState {
        let mut state = ConversationState::new();
        state.submit_user("Where is Jewel").unwrap();
        state.apply(TurnEvent::Start {
            message_id: message_id.into(),
        });
        state.apply(TurnEvent::ToolInputStart {
            tool_call_id: "call_1".into(),
            tool_name: LOCATION_TOOL.into(),
        });
        state.apply(TurnEvent::ToolOutputAvailable {
            tool_call_id: "call_1".into(),
            tool_name: Some(LOCATION_TOOL.into()),
            output,
        });
        state
    }

    fn collection(features: Vec<Value>) -> Value {
        json!({"type": "FeatureCollection", "features": features})
    }

    #[test]
    fn test_same_output_propagates_once() {
        let mut dedup = ResultDeduplicator::new();
        let mut state = state_with_output("msg_1", collection(vec![point("Jewel", 103.98)]));

        assert_eq!(dedup.inspect(&state).unwrap().len(), 1);
        state.apply(TurnEvent::TextDelta {
            text: "Here it is".into(),
        });
        assert!(dedup.inspect(&state).is_none());
    }

    #[test]
    fn test_same_output_in_new_message_propagates() {
        let mut dedup = ResultDeduplicator::new();
        let output = collection(vec![point("Jewel", 103.98)]);
        assert!(dedup.inspect(&state_with_output("msg_1", output.clone())).is_some());
        assert!(dedup.inspect(&state_with_output("msg_2", output)).is_some());
    }

    #[test]
    fn test_empty_after_empty_suppressed() {
        let mut dedup = ResultDeduplicator::new();
        assert!(dedup.inspect(&state_with_output("msg_1", collection(vec![]))).is_none());
    }

    #[test]
    fn test_empty_after_results_propagates() {
        let mut dedup = ResultDeduplicator::new();
        dedup.inspect(&state_with_output("msg_1", collection(vec![point("A", 103.8)])));
        let features = dedup.inspect(&state_with_output("msg_2", collection(vec![])));
        assert_eq!(features, Some(vec![]));
    }

    #[test]
    fn test_reset_propagates_again() {
        let mut dedup = ResultDeduplicator::new();
        let state = state_with_output("msg_1", collection(vec![point("Jewel", 103.98)]));
        assert!(dedup.inspect(&state).is_some());
        dedup.reset();
        assert_eq!(dedup.inspect(&state).unwrap().len(), 1);

        // An empty result is not swallowed after a reset either.
        let empty = state_with_output("msg_2", collection(vec![]));
        dedup.inspect(&empty);
        dedup.reset();
        assert_eq!(dedup.inspect(&empty), Some(vec![]));
    }

    #[test]
    fn test_caps_at_ten() {
        let mut dedup = ResultDeduplicator::new();
        let features = (0..12).map(|i| point(&format!("P{i}"), 103.0 + f64::from(i) / 10.0)).collect();
        let out = dedup.inspect(&state_with_output("msg_1", collection(features))).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[9].name(), Some("P9"));
    }

    #[test]
    fn test_ignores_user_message_and_other_tools() {
        let mut dedup = ResultDeduplicator::new();
        let mut state = ConversationState::new();
        state.submit_user("hi").unwrap();
        assert!(dedup.inspect(&state).is_none());

        state.apply(TurnEvent::ToolOutputAvailable {
            tool_call_id: "call_1".into(),
            tool_name: Some("get_review_rating".into()),
            output: json!({"success": true, "features": []}),
        });
        assert!(dedup.inspect(&state).is_none());
    }

    #[test]
    fn test_error_output_ignored() {
        let mut dedup = ResultDeduplicator::new();
        let mut state = ConversationState::new();
        state.submit_user("Where is Jewel").unwrap();
        state.apply(TurnEvent::ToolOutputError {
            tool_call_id: "call_1".into(),
            tool_name: Some(LOCATION_TOOL.into()),
            error_text: "Location search error: 503 - busy".into(),
        });
        assert!(dedup.inspect(&state).is_none());
    }
}
