//! Wire types for the HTTP and WebSocket surface.

use a2a_relay_core::Event;
use serde::{Deserialize, Serialize};

/// Body of a conversation creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateConversation {
    /// Working directory / context path recorded on the conversation.
    #[serde(default)]
    pub context_path: Option<String>,
}

/// Body of a prompt request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    /// Submit as a deferred task instead of waiting for the reply.
    #[serde(default)]
    pub as_task: bool,
}

/// Reply to a prompt request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptReply {
    Response { response: String },
    Task { task_id: String },
}

/// Error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Output produced before a turn failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
}

/// Frame sent to a streaming client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One relayed agent event, unchanged.
    Event { event: Event },
    /// The turn finished; `response` is the accumulated reply.
    Done { response: String },
    /// The turn failed.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<String>,
    },
}
