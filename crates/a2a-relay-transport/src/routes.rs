//! REST routes over the session manager.

use std::sync::Arc;

use a2a_relay_core::{
    AgentClient, CallStats, Conversation, ConversationInfo, ConversationStore, StatsSnapshot,
};
use a2a_relay_session::SessionManager;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    error::ApiError,
    protocol::{CreateConversation, PromptReply, PromptRequest},
};

/// Shared application state passed to handlers.
pub struct AppState<S, C>
where
    S: ConversationStore,
    C: AgentClient,
{
    pub manager: Arc<SessionManager<S, C>>,
    pub stats: Arc<CallStats>,
}

impl<S, C> AppState<S, C>
where
    S: ConversationStore,
    C: AgentClient,
{
    #[must_use]
    pub const fn new(manager: Arc<SessionManager<S, C>>, stats: Arc<CallStats>) -> Self {
        Self { manager, stats }
    }
}

impl<S, C> Clone for AppState<S, C>
where
    S: ConversationStore,
    C: AgentClient,
{
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Build the router with every route.
#[must_use]
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
    S: ConversationStore + 'static,
    C: AgentClient + 'static,
{
    let api = Router::new()
        .route(
            "/conversations",
            get(list_conversations::<S, C>).post(create_conversation::<S, C>),
        )
        .route(
            "/conversations/{id}",
            get(get_conversation::<S, C>).delete(delete_conversation::<S, C>),
        )
        .route(
            "/conversations/{id}/prompt",
            post(send_prompt::<S, C>),
        )
        .route("/stats", get(stats::<S, C>));

    #[cfg(feature = "websocket")]
    let api = api.route(
        "/conversations/{id}/prompt/stream",
        get(crate::websocket::stream_handler::<S, C>),
    );

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn list_conversations<S, C>(
    State(state): State<AppState<S, C>>,
) -> Result<Json<Vec<ConversationInfo>>, ApiError>
where
    S: ConversationStore,
    C: AgentClient,
{
    Ok(Json(state.manager.list_conversations().await?))
}

async fn create_conversation<S, C>(
    State(state): State<AppState<S, C>>,
    Json(body): Json<CreateConversation>,
) -> Result<(StatusCode, Json<Conversation>), ApiError>
where
    S: ConversationStore,
    C: AgentClient,
{
    let id = Uuid::new_v4().to_string();
    let working_dir = body.context_path.unwrap_or_default();
    let conversation = state.manager.create_session(&id, &working_dir).await?;
    let record = conversation.lock().await.clone();
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_conversation<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError>
where
    S: ConversationStore,
    C: AgentClient,
{
    let conversation = state.manager.acquire(&id).await?;
    let record = conversation.lock().await.clone();
    Ok(Json(record))
}

async fn delete_conversation<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: ConversationStore,
    C: AgentClient,
{
    state.manager.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_prompt<S, C>(
    State(state): State<AppState<S, C>>,
    Path(id): Path<String>,
    Json(body): Json<PromptRequest>,
) -> Result<Json<PromptReply>, ApiError>
where
    S: ConversationStore,
    C: AgentClient,
{
    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }
    let conversation = state.manager.acquire(&id).await?;

    let reply = if body.as_task {
        let task_id = state
            .manager
            .run_prompt_as_task(&conversation, &body.prompt)
            .await?;
        PromptReply::Task { task_id }
    } else {
        let response = state.manager.run_prompt(&conversation, &body.prompt).await?;
        PromptReply::Response { response }
    };
    Ok(Json(reply))
}

async fn stats<S, C>(State(state): State<AppState<S, C>>) -> Json<StatsSnapshot>
where
    S: ConversationStore,
    C: AgentClient,
{
    Json(state.stats.snapshot())
}
