//! Streaming relay between an agent event stream and an external sink.
//!
//! One relay invocation runs two cooperating tasks: the caller's task
//! classifies each event against the held conversation, and a spawned
//! forwarder delivers every event, in order, to the sink. The two are
//! joined by a bounded hand-off queue, so a slow sink applies
//! back-pressure instead of losing events.

use a2a_relay_core::{AgentClient, Conversation, Event, ProtocolError};
use futures::StreamExt;
use tokio::sync::mpsc;

/// Capacity of the queue between classification and forwarding.
pub const HANDOFF_CAPACITY: usize = 64;

/// Lifecycle of one relay invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Started,
    Streaming,
    Completed,
    Failed,
}

/// Result of a relay invocation.
///
/// `text` holds everything accumulated before the stream ended, including
/// when it ended in failure.
#[derive(Debug)]
pub struct RelayOutcome {
    pub text: String,
    pub state: RelayState,
    pub error: Option<ProtocolError>,
    pub events: usize,
}

impl RelayOutcome {
    fn failed(text: String, error: ProtocolError, events: usize) -> Self {
        Self {
            text,
            state: RelayState::Failed,
            error: Some(error),
            events,
        }
    }
}

/// Stream `prompt` to the agent, updating `conversation` and forwarding
/// every event to `sink`.
///
/// Continuation handles on the conversation are updated as events
/// arrive. The conversation's history is left untouched; recording the
/// turn is the caller's job.
///
/// If the sink's receiver goes away the relay keeps consuming the stream,
/// so classification always sees every event.
pub async fn relay<C>(
    client: &C,
    conversation: &mut Conversation,
    prompt: &str,
    sink: mpsc::Sender<Event>,
) -> RelayOutcome
where
    C: AgentClient + ?Sized,
{
    let mut state = RelayState::Started;
    tracing::debug!(conversation_id = %conversation.id, ?state, "Opening agent stream");

    let mut stream = match client
        .stream_message(&conversation.continuation(), prompt)
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(conversation_id = %conversation.id, error = %e, "Failed to open agent stream");
            return RelayOutcome::failed(String::new(), e, 0);
        }
    };
    state = RelayState::Streaming;
    tracing::debug!(conversation_id = %conversation.id, ?state, "Agent stream open");

    let (handoff_tx, handoff_rx) = mpsc::channel(HANDOFF_CAPACITY);
    let forwarder = tokio::spawn(forward(handoff_rx, sink));

    let mut text = String::new();
    let mut events = 0;
    let mut error = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                events += 1;
                classify(conversation, &event, &mut text);
                if handoff_tx.send(event).await.is_err() {
                    tracing::warn!(conversation_id = %conversation.id, "Event forwarder stopped early");
                }
            }
            Err(e) => {
                tracing::warn!(conversation_id = %conversation.id, error = %e, "Agent stream failed");
                error = Some(e);
                break;
            }
        }
    }

    drop(handoff_tx);
    match forwarder.await {
        Ok(delivered) => {
            tracing::debug!(conversation_id = %conversation.id, delivered, "Event forwarding finished");
        }
        Err(e) => {
            tracing::error!(conversation_id = %conversation.id, error = %e, "Event forwarder panicked");
        }
    }

    match error {
        Some(e) => RelayOutcome::failed(text, e, events),
        None => {
            state = RelayState::Completed;
            tracing::debug!(conversation_id = %conversation.id, ?state, events, "Agent stream closed");
            RelayOutcome {
                text,
                state,
                error: None,
                events,
            }
        }
    }
}

/// Apply one event's side effects to the conversation and reply text.
fn classify(conversation: &mut Conversation, event: &Event, text: &mut String) {
    if let Some((context_id, task_id)) = event.continuation() {
        conversation.adopt_continuation(context_id, task_id);
    }
    if let Some(visible) = event.visible_text() {
        text.push_str(&visible);
    }

    match event {
        Event::TaskCreated { task_id, state, .. } => {
            tracing::debug!(task_id = ?task_id, ?state, "Task created");
        }
        Event::TaskStatusUpdate { task_id, state, .. } => {
            tracing::debug!(task_id = ?task_id, ?state, "Task status update");
        }
        Event::ArtifactUpdate {
            task_id,
            last_chunk: true,
            ..
        } => {
            tracing::debug!(task_id = ?task_id, "Final artifact chunk, waiting for terminal status");
        }
        Event::Unknown { raw } => {
            tracing::debug!(%raw, "Ignoring unknown event");
        }
        Event::Message { .. } | Event::ArtifactUpdate { .. } => {
            tracing::debug!(kind = event.kind(), "Event classified");
        }
    }
}

/// Deliver handed-off events to the sink, draining after the sink closes.
async fn forward(mut handoff: mpsc::Receiver<Event>, sink: mpsc::Sender<Event>) -> usize {
    let mut sink = Some(sink);
    let mut delivered = 0;

    while let Some(event) = handoff.recv().await {
        let Some(tx) = sink.as_ref() else { continue };
        if tx.send(event).await.is_ok() {
            delivered += 1;
        } else {
            tracing::debug!("Event sink closed, draining remaining events");
            sink = None;
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use a2a_relay_core::{Continuation, EventStream, TaskState};
    use async_trait::async_trait;

    use super::*;

    /// Agent whose stream replays a fixed script.
    struct ScriptedAgent {
        script: Mutex<Option<Result<Vec<Result<Event, ProtocolError>>, ProtocolError>>>,
        seen: Mutex<Option<Continuation>>,
    }

    impl ScriptedAgent {
        fn new(items: Vec<Result<Event, ProtocolError>>) -> Self {
            Self {
                script: Mutex::new(Some(Ok(items))),
                seen: Mutex::new(None),
            }
        }

        fn refusing(error: ProtocolError) -> Self {
            Self {
                script: Mutex::new(Some(Err(error))),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AgentClient for ScriptedAgent {
        async fn send_message(&self, _: &str, _: &str) -> Result<String, ProtocolError> {
            unreachable!("relay only streams")
        }

        async fn send_task(&self, _: &str, _: &str) -> Result<String, ProtocolError> {
            unreachable!("relay only streams")
        }

        async fn stream_message(
            &self,
            continuation: &Continuation,
            _prompt: &str,
        ) -> Result<EventStream, ProtocolError> {
            *self.seen.lock().unwrap() = Some(continuation.clone());
            let items = self.script.lock().unwrap().take().expect("stream opened twice")?;
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn message(text: &str) -> Event {
        Event::Message {
            context_id: Some("ctx-1".into()),
            task_id: Some("task-1".into()),
            text_parts: vec![text.into()],
        }
    }

    async fn collect(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_single_message_is_forwarded_and_accumulated() {
        let agent = ScriptedAgent::new(vec![Ok(message("mock response"))]);
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(8);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;
        let forwarded = collect(rx).await;

        assert_eq!(outcome.state, RelayState::Completed);
        assert_eq!(outcome.text, "mock response");
        assert_eq!(outcome.events, 1);
        assert_eq!(forwarded, vec![message("mock response")]);
        assert_eq!(conv.context_id.as_deref(), Some("ctx-1"));
        assert_eq!(conv.task_id.as_deref(), Some("task-1"));
        assert!(conv.history.is_empty());
    }

    #[tokio::test]
    async fn test_status_update_without_text_updates_handles_only() {
        let agent = ScriptedAgent::new(vec![
            Ok(Event::TaskStatusUpdate {
                context_id: Some("ctx-2".into()),
                task_id: Some("task-2".into()),
                state: TaskState::Working,
                message: Some(vec![]),
            }),
            Ok(Event::TaskStatusUpdate {
                context_id: Some("ctx-2".into()),
                task_id: Some("task-2".into()),
                state: TaskState::Completed,
                message: None,
            }),
        ]);
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(8);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;

        assert_eq!(outcome.text, "");
        assert_eq!(outcome.events, 2);
        assert_eq!(collect(rx).await.len(), 2);
        assert_eq!(conv.context_id.as_deref(), Some("ctx-2"));
        assert_eq!(conv.task_id.as_deref(), Some("task-2"));
    }

    #[tokio::test]
    async fn test_artifacts_and_unknown_add_no_text() {
        let agent = ScriptedAgent::new(vec![
            Ok(Event::TaskCreated {
                context_id: Some("ctx".into()),
                task_id: Some("t".into()),
                state: TaskState::Submitted,
            }),
            Ok(Event::ArtifactUpdate {
                context_id: Some("ctx".into()),
                task_id: Some("t".into()),
                text_parts: vec!["artifact text".into()],
                last_chunk: true,
            }),
            Ok(Event::Unknown {
                raw: serde_json::json!({"kind": "ping"}),
            }),
            Ok(Event::TaskStatusUpdate {
                context_id: Some("ctx".into()),
                task_id: Some("t".into()),
                state: TaskState::Completed,
                message: Some(vec!["done".into()]),
            }),
        ]);
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(8);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;

        assert_eq!(outcome.state, RelayState::Completed);
        assert_eq!(outcome.text, "done");
        let kinds: Vec<&str> = collect(rx).await.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["task", "artifact-update", "unknown", "status-update"]);
    }

    #[tokio::test]
    async fn test_continuation_is_sent_and_empty_handles_ignored() {
        let agent = ScriptedAgent::new(vec![Ok(Event::Message {
            context_id: Some(String::new()),
            task_id: None,
            text_parts: vec!["x".into()],
        })]);
        let mut conv = Conversation::new("c1", "");
        conv.context_id = Some("ctx-old".into());
        conv.task_id = Some("task-old".into());
        let (tx, _rx) = mpsc::channel(8);

        relay(&agent, &mut conv, "hi", tx).await;

        let seen = agent.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.context_id.as_deref(), Some("ctx-old"));
        assert_eq!(seen.task_id.as_deref(), Some("task-old"));
        assert_eq!(conv.context_id.as_deref(), Some("ctx-old"));
        assert_eq!(conv.task_id.as_deref(), Some("task-old"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_text() {
        let agent = ScriptedAgent::new(vec![
            Ok(message("partial ")),
            Err(ProtocolError::Stream("connection reset".into())),
            Ok(message("never seen")),
        ]);
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(8);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;

        assert_eq!(outcome.state, RelayState::Failed);
        assert_eq!(outcome.text, "partial ");
        assert!(matches!(outcome.error, Some(ProtocolError::Stream(_))));
        assert_eq!(collect(rx).await, vec![message("partial ")]);
        assert_eq!(conv.context_id.as_deref(), Some("ctx-1"));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let agent = ScriptedAgent::refusing(ProtocolError::Status {
            status: 503,
            body: "busy".into(),
        });
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(8);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;

        assert_eq!(outcome.state, RelayState::Failed);
        assert_eq!(outcome.events, 0);
        assert!(outcome.text.is_empty());
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_sink_does_not_stop_classification() {
        let agent = ScriptedAgent::new(vec![Ok(message("a")), Ok(message("b")), Ok(message("c"))]);
        let mut conv = Conversation::new("c1", "");
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let outcome = relay(&agent, &mut conv, "hi", tx).await;

        assert_eq!(outcome.state, RelayState::Completed);
        assert_eq!(outcome.text, "abc");
        assert_eq!(outcome.events, 3);
    }

    #[tokio::test]
    async fn test_slow_sink_receives_every_event_in_order() {
        let texts: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        let agent = ScriptedAgent::new(texts.iter().map(|t| Ok(message(t))).collect());
        let mut conv = Conversation::new("c1", "");
        let (tx, mut rx) = mpsc::channel(1);

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                tokio::task::yield_now().await;
                if let Event::Message { text_parts, .. } = event {
                    seen.push(text_parts.concat());
                }
            }
            seen
        });

        let outcome = relay(&agent, &mut conv, "hi", tx).await;
        let seen = consumer.await.unwrap();

        assert_eq!(seen, texts);
        assert_eq!(outcome.text, texts.concat());
    }
}
