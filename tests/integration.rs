//! Integration tests for agentstream using a mock connector.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use agentstream::{
    AgentStreamClient, Connector, Credential, Error, EventKind, FinalResult, SessionState,
};

use common::{FinalSink, MockConnector, ScenarioBuilder};

fn client(connector: &Arc<MockConnector>, sink: &FinalSink) -> AgentStreamClient {
    AgentStreamClient::builder()
        .connector(Arc::clone(connector) as Arc<dyn Connector>)
        .on_final(sink.callback())
        .build()
        .expect("valid config")
}

/// Let the driver task catch up until `cond` holds.
async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn nutrition_scenario() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client
        .submit("What should I eat?", Some(Credential::new("abc")))
        .await
        .expect("session started");
    let peer = connector.last_peer();
    assert!(peer.record.sent().is_empty(), "nothing sent before open");

    peer.open().await;
    until(|| !peer.record.sent().is_empty()).await;
    assert_eq!(
        peer.record.sent(),
        vec![json!({"type": "start", "query": "What should I eat?", "token": "abc"})]
    );

    peer.message(r#"{"type":"agent","agent":"nutrition_agent","text":"Analyzing your diet..."}"#)
        .await;
    peer.message(r#"{"type":"final","text":"Eat more vegetables."}"#)
        .await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.state, SessionState::Closed);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.log.len(), 2);
    assert_eq!(outcome.log.events()[0].agent_label(), "nutrition agent");
    assert_eq!(outcome.log.events()[0].text, "Analyzing your diet...");
    assert!(!outcome.log.awaiting_response());

    assert_eq!(
        sink.payloads(),
        vec![json!({"type": "final", "text": "Eat more vegetables."})]
    );
    assert_eq!(peer.record.closes(), 1);
    assert_eq!(peer.record.sent().len(), 1, "exactly one start message");
}

#[tokio::test]
async fn backend_sequence_reaches_callback() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("Plan my week", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.play(
        &ScenarioBuilder::new()
            .agent("supervisor", "Routing your question...")
            .agent("nutrition_agent", "Building a meal plan...")
            .agent("fitness_agent", "Drafting a workout schedule...")
            .final_answer("Here is your plan.", &["nutrition_agent", "fitness_agent"])
            .build(),
    )
    .await;

    let outcome = client.wait().await.expect("outcome");
    let agents: Vec<&str> = outcome.log.iter().map(|e| e.agent.as_str()).collect();
    assert_eq!(
        agents,
        vec!["supervisor", "nutrition_agent", "fitness_agent", "unknown"]
    );
    assert_eq!(outcome.log.final_event().map(|e| e.kind.clone()), Some(EventKind::Final));

    let payloads = sink.payloads();
    assert_eq!(payloads.len(), 1);
    let result = FinalResult::from_payload(&payloads[0]);
    assert_eq!(result.answer_text(), Some("Here is your plan."));
    assert_eq!(result.agents_used, vec!["nutrition_agent", "fitness_agent"]);
    assert_eq!(peer.record.sent()[0]["token"], serde_json::Value::Null);
}

#[tokio::test]
async fn new_query_supersedes_open_session() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("first", None).await;
    let first = connector.peer(0);
    first.open().await;
    first.message(r#"{"agent":"supervisor","text":"old"}"#).await;
    until(|| client.log().len() == 1).await;

    client.submit("second", None).await;
    assert_eq!(first.record.closes(), 1);
    assert_eq!(connector.connects(), 2);
    assert!(client.log().is_empty(), "new session starts with an empty log");

    // A late frame on the superseded connection goes nowhere.
    first.message(r#"{"type":"final","answer":"stale"}"#).await;

    let second = connector.peer(1);
    second.open().await;
    second.message(r#"{"type":"final","answer":"fresh"}"#).await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.log.len(), 1);
    assert!(outcome.log.iter().all(|e| e.text != "old"));
    assert_eq!(sink.payloads().len(), 1);
    assert_eq!(sink.payloads()[0]["answer"], "fresh");
    assert_eq!(second.record.sent()[0]["query"], "second");
}

#[tokio::test]
async fn resubmitting_active_query_changes_nothing() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    let first = client.submit("same", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    until(|| peer.record.sent().len() == 1).await;

    let second = client.submit("same", None).await;
    assert_eq!(first, second);
    assert_eq!(connector.connects(), 1);
    assert_eq!(peer.record.closes(), 0);
    assert_eq!(peer.record.sent().len(), 1);
}

#[tokio::test]
async fn teardown_closes_open_connection_once() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    until(|| peer.record.sent().len() == 1).await;

    let outcome = client.teardown().await.expect("outcome");
    assert_eq!(outcome.state, SessionState::Closed);
    assert!(matches!(outcome.error, Some(Error::Cancelled)));
    assert_eq!(peer.record.closes(), 1);

    assert!(client.teardown().await.is_none());
    assert_eq!(peer.record.closes(), 1);
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn teardown_after_final_does_not_close_again() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.message(r#"{"type":"final"}"#).await;
    until(|| peer.record.closes() == 1).await;

    let outcome = client.teardown().await.expect("outcome");
    assert!(outcome.is_complete());
    assert!(outcome.error.is_none());
    assert_eq!(peer.record.closes(), 1);
}

#[tokio::test]
async fn malformed_messages_are_dropped() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.play(
        &ScenarioBuilder::new()
            .raw("{this is not json")
            .raw("[\"array\"]")
            .raw("42")
            .agent("fitness_agent", "still here")
            .final_answer("done", &[])
            .build(),
    )
    .await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.state, SessionState::Closed);
    assert_eq!(outcome.log.len(), 2);
    assert_eq!(outcome.log.events()[0].text, "still here");
    assert_eq!(sink.payloads().len(), 1);
}

#[tokio::test]
async fn empty_query_opens_nothing() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    assert_eq!(client.submit("", Some(Credential::new("abc"))).await, None);
    assert_eq!(connector.connects(), 0);
    assert!(client.log().is_empty());
    assert!(client.wait().await.is_none());
}

#[tokio::test]
async fn only_first_final_counts() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.play(
        &ScenarioBuilder::new()
            .final_answer("one", &[])
            .final_answer("two", &[])
            .build(),
    )
    .await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.log.len(), 1);
    assert_eq!(sink.payloads().len(), 1);
    assert_eq!(sink.payloads()[0]["answer"], "one");
    assert_eq!(peer.record.closes(), 1);
}

#[tokio::test]
async fn unknown_and_error_kinds_are_not_terminal() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.play(
        &ScenarioBuilder::new()
            .raw(r#"{"type":"tool_call","agent":"fitness_agent","text":"lookup"}"#)
            .error("WebSocket error: upstream timeout")
            .final_answer("recovered", &[])
            .build(),
    )
    .await;

    let outcome = client.wait().await.expect("outcome");
    let kinds: Vec<EventKind> = outcome.log.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Other("tool_call".into()),
            EventKind::Error,
            EventKind::Final
        ]
    );
    assert_eq!(sink.payloads().len(), 1);
}

#[tokio::test]
async fn transport_error_ends_errored_without_callback() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    until(|| peer.record.sent().len() == 1).await;
    peer.message(r#"{"agent":"supervisor"}"#).await;
    peer.error("connection reset").await;
    peer.message(r#"{"type":"final"}"#).await;
    peer.closed().await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.state, SessionState::Errored);
    assert!(matches!(outcome.error, Some(Error::Transport(ref r)) if r == "connection reset"));
    assert_eq!(outcome.log.len(), 1);
    assert!(sink.payloads().is_empty());
    assert_eq!(peer.record.closes(), 0);
}

#[tokio::test]
async fn server_close_before_final_is_incomplete() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    until(|| peer.record.sent().len() == 1).await;
    peer.message(r#"{"agent":"supervisor","text":"thinking"}"#).await;
    peer.closed().await;

    let outcome = client.wait().await.expect("outcome");
    assert_eq!(outcome.state, SessionState::Closed);
    assert!(!outcome.is_complete());
    assert!(outcome.log.awaiting_response());
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn subscribers_see_progress() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);
    let log = client.subscribe();

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    peer.message(r#"{"agent":"nutrition_agent","text":"one"}"#).await;
    until(|| log.borrow().len() == 1).await;
    assert!(log.borrow().awaiting_response());

    peer.message(r#"{"type":"final","answer":"two"}"#).await;
    client.wait().await.expect("outcome");
    assert_eq!(log.borrow().len(), 2);
    assert!(!log.borrow().awaiting_response());
}

#[tokio::test]
async fn endpoint_follows_page_scheme() {
    let connector = MockConnector::new();
    let mut client = AgentStreamClient::builder()
        .host("api.example.com")
        .page_scheme("https:")
        .connector(Arc::clone(&connector) as Arc<dyn Connector>)
        .build()
        .unwrap();

    client.submit("q", None).await;
    assert_eq!(
        connector.last_peer().endpoint.as_str(),
        "wss://api.example.com/ws/process-query"
    );
}

#[tokio::test]
async fn dropping_client_closes_connection() {
    let connector = MockConnector::new();
    let sink = FinalSink::default();
    let mut client = client(&connector, &sink);

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;
    until(|| peer.record.sent().len() == 1).await;

    drop(client);
    until(|| peer.record.closes() == 1).await;
}

#[tokio::test(start_paused = true)]
async fn silent_backend_times_out() {
    let connector = MockConnector::new();
    let mut client = AgentStreamClient::builder()
        .idle_timeout(Duration::from_secs(5))
        .connector(Arc::clone(&connector) as Arc<dyn Connector>)
        .build()
        .unwrap();

    client.submit("q", None).await;
    let peer = connector.last_peer();
    peer.open().await;

    let outcome = client.wait().await.expect("outcome");
    assert!(matches!(outcome.error, Some(Error::Timeout(d)) if d == Duration::from_secs(5)));
    assert_eq!(outcome.state, SessionState::Closed);
    assert_eq!(peer.record.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn handshake_that_never_completes_times_out() {
    let connector = MockConnector::new();
    let mut client = AgentStreamClient::builder()
        .connect_timeout(Duration::from_secs(3))
        .connector(Arc::clone(&connector) as Arc<dyn Connector>)
        .build()
        .unwrap();

    client.submit("q", None).await;
    let outcome = client.wait().await.expect("outcome");
    assert!(matches!(outcome.error, Some(Error::Timeout(_))));
    assert!(connector.last_peer().record.sent().is_empty());
    assert_eq!(connector.last_peer().record.closes(), 0);
}
