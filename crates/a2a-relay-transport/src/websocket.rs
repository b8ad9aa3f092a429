//! WebSocket streaming of a single prompt turn.
//!
//! The client sends the prompt as its first text frame. Every relayed
//! event is sent back as an `event` frame, followed by one `done` or
//! `error` frame, after which the socket is closed.

use a2a_relay_core::{AgentClient, ConversationStore, Event};
use a2a_relay_session::{ManagerError, SessionManager, SharedConversation};
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{error::ApiError, protocol::ServerMessage, routes::AppState};

const FRAME_BUFFER: usize = 64;

/// WebSocket upgrade handler for a conversation's prompt stream.
///
/// Unknown conversations are rejected before the upgrade.
///
/// # Errors
/// Returns error if the conversation cannot be acquired.
pub async fn stream_handler<S, C>(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState<S, C>>,
) -> Result<Response, ApiError>
where
    S: ConversationStore + 'static,
    C: AgentClient + 'static,
{
    let conversation = state.manager.acquire(&id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, conversation)))
}

async fn handle_socket<S, C>(
    socket: WebSocket,
    state: AppState<S, C>,
    conversation: SharedConversation,
) where
    S: ConversationStore + 'static,
    C: AgentClient + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    let prompt = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => break text,
                Err(_) => continue,
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::error!("WebSocket error: {e}");
                return;
            }
        }
    };

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(FRAME_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    stream_turn(&state.manager, &conversation, &prompt, tx).await;

    if let Err(e) = send_task.await {
        tracing::error!("WebSocket send task failed: {e}");
    }
}

/// Run one streaming turn, writing its frames to `frames`.
///
/// Every event frame is sent before the final `done` or `error` frame.
pub async fn stream_turn<S, C>(
    manager: &SessionManager<S, C>,
    conversation: &SharedConversation,
    prompt: &str,
    frames: mpsc::Sender<ServerMessage>,
) where
    S: ConversationStore,
    C: AgentClient,
{
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(FRAME_BUFFER);
    let event_frames = frames.clone();
    let pump = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if event_frames.send(ServerMessage::Event { event }).await.is_err() {
                break;
            }
        }
    });

    let result = manager.run_prompt_stream(conversation, prompt, event_tx).await;
    if let Err(e) = pump.await {
        tracing::error!("Event pump failed: {e}");
    }

    let last = match result {
        Ok(response) => ServerMessage::Done { response },
        Err(e) => {
            let partial = match &e {
                ManagerError::Turn(turn) => Some(turn.output.clone()),
                ManagerError::Store(_) => None,
            };
            ServerMessage::Error {
                message: e.to_string(),
                partial,
            }
        }
    };
    let _ = frames.send(last).await;
}
