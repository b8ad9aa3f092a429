use a2a_relay_client::{A2aClient, sse::MAX_LINE_BYTES};
use a2a_relay_core::{AgentClient, Continuation, Event, ProtocolError, TaskState};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

fn sse_body(results: &[Value]) -> String {
    results
        .iter()
        .map(|r| format!("data: {}\n\n", rpc_result(r.clone())))
        .collect()
}

#[tokio::test]
async fn send_message_returns_agent_message_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "message/send",
            "params": {"message": {"role": "user", "contextId": "conv-1", "parts": [{"kind": "text", "text": "hello"}]}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!({
            "kind": "message",
            "role": "agent",
            "messageId": "m-2",
            "parts": [{"kind": "text", "text": "mock response"}]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let text = client.send_message("conv-1", "hello").await.unwrap();
    assert_eq!(text, "mock response");
}

#[tokio::test]
async fn send_message_reads_task_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!({
            "kind": "task",
            "id": "t-1",
            "contextId": "conv-1",
            "status": {"state": "completed"},
            "history": [
                {"kind": "message", "role": "user", "parts": [{"kind": "text", "text": "hello"}]},
                {"kind": "message", "role": "agent", "parts": [{"kind": "text", "text": "hi there"}]}
            ]
        }))))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    assert_eq!(client.send_message("conv-1", "hello").await.unwrap(), "hi there");
}

#[tokio::test]
async fn send_message_surfaces_status_and_empty_replies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"params": {"message": {"contextId": "broken"}}})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"params": {"message": {"contextId": "quiet"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!({
            "kind": "message",
            "role": "agent",
            "parts": []
        }))))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();

    let err = client.send_message("broken", "hello").await.unwrap_err();
    assert!(
        matches!(&err, ProtocolError::Status { status: 500, body } if body == "boom"),
        "unexpected error: {err}"
    );

    let err = client.send_message("quiet", "hello").await.unwrap_err();
    assert!(matches!(err, ProtocolError::NoResponseText));
    assert_eq!(err.to_string(), "no response text");
}

#[tokio::test]
async fn send_message_rejects_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let err = client.send_message("conv-1", "hello").await.unwrap_err();
    assert!(matches!(err, ProtocolError::Decode(_)));
}

#[tokio::test]
async fn send_task_is_non_blocking_and_returns_task_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "message/send",
            "params": {"configuration": {"blocking": false}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!({
            "kind": "task",
            "id": "mock-task-id",
            "contextId": "conv-1",
            "status": {"state": "submitted"}
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    assert_eq!(client.send_task("conv-1", "later").await.unwrap(), "mock-task-id");
}

#[tokio::test]
async fn send_task_rejects_message_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!({
            "kind": "message",
            "role": "agent",
            "parts": [{"kind": "text", "text": "done already"}]
        }))))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let err = client.send_task("conv-1", "later").await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedKind { expected: "task", ref found } if found == "message"
    ));
}

#[tokio::test]
async fn stream_message_yields_events_in_order() {
    let server = MockServer::start().await;

    let mut body = sse_body(&[
        json!({"kind": "task", "id": "t-1", "contextId": "ctx-1", "status": {"state": "submitted"}}),
        json!({
            "kind": "status-update", "taskId": "t-1", "contextId": "ctx-1", "final": false,
            "status": {"state": "working", "message": {"kind": "message", "role": "agent", "parts": [{"kind": "text", "text": "thinking"}]}}
        }),
        json!({
            "kind": "artifact-update", "taskId": "t-1", "contextId": "ctx-1", "lastChunk": true,
            "artifact": {"artifactId": "a-1", "parts": [{"kind": "text", "text": "artifact"}]}
        }),
        json!({"kind": "ping"}),
        json!({"kind": "status-update", "taskId": "t-1", "contextId": "ctx-1", "final": true, "status": {"state": "completed"}}),
    ]);
    body.insert_str(0, ": keep-alive\n\n");

    Mock::given(method("POST"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "method": "message/stream",
            "params": {"message": {"contextId": "ctx-0", "taskId": "t-0"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let continuation = Continuation {
        context_id: Some("ctx-0".into()),
        task_id: Some("t-0".into()),
    };
    let events: Vec<Event> = client
        .stream_message(&continuation, "go")
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec!["task", "status-update", "artifact-update", "unknown", "status-update"]
    );
    assert_eq!(
        events[1],
        Event::TaskStatusUpdate {
            context_id: Some("ctx-1".into()),
            task_id: Some("t-1".into()),
            state: TaskState::Working,
            message: Some(vec!["thinking".into()]),
        }
    );
}

#[tokio::test]
async fn stream_message_fails_on_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let result = client.stream_message(&Continuation::default(), "go").await;
    assert!(matches!(
        result,
        Err(ProtocolError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn stream_message_ends_on_rpc_error() {
    let server = MockServer::start().await;

    let body = format!(
        "{}data: {}\n\n{}",
        sse_body(&[json!({"kind": "message", "role": "agent", "parts": [{"kind": "text", "text": "partial"}]})]),
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32603, "message": "internal"}}),
        sse_body(&[json!({"kind": "message", "role": "agent", "parts": [{"kind": "text", "text": "never"}]})]),
    );

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let items: Vec<_> = client
        .stream_message(&Continuation::default(), "go")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Ok(Event::Message { text_parts, .. }) if text_parts == &["partial"]));
    assert!(matches!(&items[1], Err(ProtocolError::Rpc { code: -32603, .. })));
}

#[tokio::test]
async fn stream_message_fails_on_oversized_line() {
    let server = MockServer::start().await;

    let body = format!(
        "{}data: {}",
        sse_body(&[json!({"kind": "message", "role": "agent", "parts": [{"kind": "text", "text": "partial"}]})]),
        "x".repeat(MAX_LINE_BYTES + 1),
    );

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = A2aClient::new(server.uri()).unwrap();
    let items: Vec<_> = client
        .stream_message(&Continuation::default(), "go")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Ok(Event::Message { text_parts, .. }) if text_parts == &["partial"]));
    match &items[1] {
        Err(ProtocolError::Stream(e)) => assert!(e.to_string().contains("exceeds"), "{e}"),
        other => panic!("expected stream error, got {other:?}"),
    }
}

#[tokio::test]
async fn probe_checks_agent_card() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/agent-card.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "agent"})))
        .mount(&server)
        .await;

    let client = A2aClient::new(format!("{}/", server.uri())).unwrap();
    assert!(client.probe().await);

    let unreachable = A2aClient::new("http://127.0.0.1:9").unwrap();
    assert!(!unreachable.probe().await);
}
