//! End-to-end turns: orchestrator events folded into a session.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::get;
use futures::StreamExt;
use serde_json::json;
use tokio::net::TcpListener;
use waymark_agent::{HistoryMessage, Orchestrator, OrchestratorConfig, build_registry};
use waymark_core::mock::{MockError, MockProvider};
use waymark_core::test_helpers::{mock_for, text_stream, tool_call_stream};
use waymark_core::{ChatRole, StreamEvent, TurnEvent};
use waymark_places::{LocationSearch, LocationSearchConfig, RatingConfig, RatingLookup};
use waymark_session::{Role, Session, Status, TerminalMap, WireMessage};

async fn fake_nominatim() -> String {
    let router = Router::new().route(
        "/search",
        get(|| async {
            Json(json!([{
                "display_name": "Merlion Park",
                "geojson": {"type": "Point", "coordinates": [103.8545, 1.2868]}
            }]))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn orchestrator(mock: &Arc<MockProvider>) -> Orchestrator {
    let search = LocationSearch::new(LocationSearchConfig {
        base_url: fake_nominatim().await,
        ..Default::default()
    })
    .unwrap();
    let rating = RatingLookup::new(RatingConfig::default()).unwrap();
    Orchestrator::new(
        mock.clone(),
        build_registry(search, rating).unwrap(),
        OrchestratorConfig::default(),
    )
}

fn to_history(messages: Vec<WireMessage>) -> Vec<HistoryMessage> {
    messages
        .into_iter()
        .map(|m| HistoryMessage {
            role: match m.role {
                Role::User => ChatRole::User,
                Role::Assistant => ChatRole::Assistant,
                Role::System => ChatRole::System,
            },
            text: m.text,
        })
        .collect()
}

async fn run_turn(
    orchestrator: &Orchestrator,
    session: &mut Session<TerminalMap>,
    text: &str,
) -> Vec<TurnEvent> {
    let history = to_history(session.submit(text).unwrap());
    let events: Vec<TurnEvent> = orchestrator.handle(history).collect().await;
    for event in &events {
        session.apply(event.clone()).unwrap();
    }
    events
}

#[tokio::test]
async fn test_where_is_merlion_park() {
    let mock = Arc::new(mock_for("mock", "test-model"));
    mock.queue_stream(tool_call_stream(&[(
        "call_1",
        "search_location",
        json!({"query": "Merlion Park"}),
    )]));
    mock.queue_stream(text_stream(&[]));
    let orchestrator = orchestrator(&mock).await;
    let mut session = Session::new(TerminalMap::new());

    run_turn(&orchestrator, &mut session, "Where is Merlion Park").await;

    assert_eq!(session.state().status(), Status::Ready);
    let transcript = session.transcript();
    assert_eq!(
        transcript.last().unwrap().1,
        vec!["Found 1 location:\n1. Merlion Park"]
    );

    let map = session.map().surface().unwrap();
    assert_eq!(map.markers().len(), 1);
    assert_eq!(map.markers()[0].label, "Merlion Park");
    let (bounds, options) = map.viewport().unwrap();
    assert!((bounds.center().lng - 103.8545).abs() < 1e-9);
    assert_eq!(options.padding, 50);
    assert_eq!(map.fit_count(), 1);
}

#[tokio::test]
async fn test_japanese_food_is_text_only() {
    let mock = Arc::new(mock_for("mock", "test-model"));
    mock.queue_stream(text_stream(&["Try Ramen Keisuke Tonkotsu King ", "at Tanjong Pagar."]));
    let orchestrator = orchestrator(&mock).await;
    let mut session = Session::new(TerminalMap::new());

    let events = run_turn(&orchestrator, &mut session, "japanese food").await;

    assert!(!events.iter().any(|e| matches!(e, TurnEvent::ToolInputStart { .. })));
    assert_eq!(
        session.transcript().last().unwrap().1,
        vec!["Try Ramen Keisuke Tonkotsu King at Tanjong Pagar."]
    );
    let map = session.map().surface().unwrap();
    assert!(map.markers().is_empty());
    assert!(map.viewport().is_none());
}

#[tokio::test]
async fn test_model_failure_mid_stream_keeps_partial_text() {
    let mock = Arc::new(mock_for("mock", "test-model"));
    mock.queue_stream_results(vec![
        Ok(StreamEvent::TextDelta("Merlion Park sits at".into())),
        Err(MockError::Http {
            status: None,
            message: "connection reset".into(),
        }),
    ]);
    let orchestrator = orchestrator(&mock).await;
    let mut session = Session::new(TerminalMap::new());

    let events = run_turn(&orchestrator, &mut session, "Where is Merlion Park").await;

    assert!(matches!(events.last(), Some(TurnEvent::Error { .. })));
    assert_eq!(session.state().status(), Status::Error);
    assert!(session.state().last_error().unwrap().contains("connection reset"));
    assert_eq!(
        session.transcript().last().unwrap().1,
        vec!["Merlion Park sits at"]
    );
    assert!(session.submit("retry").is_err());
}

#[tokio::test]
async fn test_repeated_search_does_not_redraw() {
    let mock = Arc::new(mock_for("mock", "test-model"));
    for id in ["call_1", "call_2"] {
        mock.queue_stream(tool_call_stream(&[(
            id,
            "search_location",
            json!({"query": "Merlion Park"}),
        )]));
        mock.queue_stream(text_stream(&["Here it is."]));
    }
    let orchestrator = orchestrator(&mock).await;
    let mut session = Session::new(TerminalMap::new());

    run_turn(&orchestrator, &mut session, "Where is Merlion Park").await;
    run_turn(&orchestrator, &mut session, "Merlion Park again please").await;

    // Same features in a new message: propagated, but the map skips the
    // identical list.
    let map = session.map().surface().unwrap();
    assert_eq!(map.markers().len(), 1);
    assert_eq!(map.fit_count(), 1);

    // The second request carried the first turn's text.
    let second = &mock.recorded_calls()[2];
    let texts: Vec<String> = second.messages.iter().map(|m| m.joined_text()).collect();
    assert!(texts.contains(&"Where is Merlion Park".to_owned()));
    assert!(texts.contains(&"Here it is.".to_owned()));
}
