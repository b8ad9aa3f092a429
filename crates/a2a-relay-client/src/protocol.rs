//! Agent wire protocol: JSON-RPC envelopes, messages, tasks and events.

use a2a_relay_core::{Event, ProtocolError, TaskState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_SEND: &str = "message/send";
pub const METHOD_STREAM: &str = "message/stream";

pub const KIND_MESSAGE: &str = "message";
pub const KIND_TASK: &str = "task";
pub const KIND_STATUS_UPDATE: &str = "status-update";
pub const KIND_ARTIFACT_UPDATE: &str = "artifact-update";

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: P,
}

impl<P> RpcRequest<P> {
    #[must_use]
    pub const fn new(id: u64, method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC response envelope (also used for each streamed record).
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl RpcResponse {
    /// Extract the result payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::Rpc` for an error reply and
    /// `ProtocolError::UnexpectedKind` when neither field is present.
    pub fn into_result(self) -> Result<Value, ProtocolError> {
        if let Some(err) = self.error {
            return Err(ProtocolError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or_else(|| ProtocolError::UnexpectedKind {
            expected: "result",
            found: "empty response".to_string(),
        })
    }
}

/// Parameters of `message/send` and `message/stream`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendConfiguration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfiguration {
    pub blocking: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    #[default]
    #[serde(other)]
    Other,
}

/// One content part of a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    File { file: Value },
    #[serde(other)]
    Other,
}

fn text_parts(parts: &[Part]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text } if !text.is_empty() => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn message_kind() -> String {
    KIND_MESSAGE.to_string()
}

/// A protocol message, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "message_kind")]
    pub kind: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Message {
    /// Build a user message with a fresh message ID.
    ///
    /// Empty continuation handles are omitted from the wire.
    #[must_use]
    pub fn user(prompt: &str, context_id: Option<&str>, task_id: Option<&str>) -> Self {
        let present = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            kind: message_kind(),
            role: Role::User,
            parts: vec![Part::Text {
                text: prompt.to_string(),
            }],
            message_id: Some(Uuid::new_v4().to_string()),
            context_id: present(context_id),
            task_id: present(task_id),
        }
    }

    /// Text-typed parts, in order.
    #[must_use]
    pub fn text_parts(&self) -> Vec<String> {
        text_parts(&self.parts)
    }

    /// Concatenated text of the message.
    #[must_use]
    pub fn text(&self) -> String {
        self.text_parts().concat()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub context_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Text of the agent's reply carried by this task.
    ///
    /// Agent-authored history messages first, then the status message,
    /// then artifact text.
    #[must_use]
    pub fn reply_text(&self) -> String {
        let from_history: String = self
            .history
            .iter()
            .filter(|m| m.role == Role::Agent)
            .map(Message::text)
            .collect();
        if !from_history.is_empty() {
            return from_history;
        }
        let from_status = self
            .status
            .message
            .as_ref()
            .map(Message::text)
            .unwrap_or_default();
        if !from_status.is_empty() {
            return from_status;
        }
        self.artifacts
            .iter()
            .flat_map(|a| text_parts(&a.parts))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    pub artifact: Artifact,
    #[serde(default)]
    pub last_chunk: Option<bool>,
}

/// Only the discriminant of a result payload.
#[derive(Debug, Deserialize)]
struct Discriminant {
    #[serde(default)]
    kind: Option<String>,
}

fn discriminant(result: &Value) -> Option<String> {
    Discriminant::deserialize(result).ok().and_then(|d| d.kind)
}

fn decode_known(kind: &str, result: &Value) -> Option<Result<Event, serde_json::Error>> {
    let event = match kind {
        KIND_MESSAGE => Message::deserialize(result).map(|m| Event::Message {
            text_parts: m.text_parts(),
            context_id: m.context_id,
            task_id: m.task_id,
        }),
        KIND_TASK => Task::deserialize(result).map(|t| Event::TaskCreated {
            context_id: t.context_id,
            task_id: Some(t.id),
            state: t.status.state,
        }),
        KIND_STATUS_UPDATE => TaskStatusUpdateEvent::deserialize(result).map(|u| {
            Event::TaskStatusUpdate {
                message: u.status.message.as_ref().map(Message::text_parts),
                context_id: u.context_id,
                task_id: u.task_id,
                state: u.status.state,
            }
        }),
        KIND_ARTIFACT_UPDATE => TaskArtifactUpdateEvent::deserialize(result).map(|u| {
            Event::ArtifactUpdate {
                text_parts: text_parts(&u.artifact.parts),
                context_id: u.context_id,
                task_id: u.task_id,
                last_chunk: u.last_chunk.unwrap_or(false),
            }
        }),
        _ => return None,
    };
    Some(event)
}

/// Decode a streamed result payload into an `Event`.
///
/// The discriminant is read first. Fields a kind can do without, such as
/// a message role or continuation IDs, may be absent. Payloads with an
/// unrecognized discriminant, or whose fields have the wrong shape,
/// become `Event::Unknown`.
#[must_use]
pub fn decode_event(result: Value) -> Event {
    let Some(kind) = discriminant(&result) else {
        return Event::Unknown { raw: result };
    };
    match decode_known(&kind, &result) {
        Some(Ok(event)) => event,
        Some(Err(e)) => {
            tracing::warn!(kind = %kind, error = %e, "Undecodable event payload");
            Event::Unknown { raw: result }
        }
        None => Event::Unknown { raw: result },
    }
}

/// Extract reply text from a synchronous `message/send` result.
///
/// # Errors
/// Returns `ProtocolError::UnexpectedKind` for results that are neither a
/// message nor a task, `ProtocolError::Decode` for malformed payloads and
/// `ProtocolError::NoResponseText` when no text was found.
pub fn reply_text(result: &Value) -> Result<String, ProtocolError> {
    let text = match discriminant(result).as_deref() {
        Some(KIND_TASK) => Task::deserialize(result)?.reply_text(),
        Some(KIND_MESSAGE) => {
            let message = Message::deserialize(result)?;
            if message.role == Role::Agent {
                message.text()
            } else {
                String::new()
            }
        }
        other => {
            return Err(ProtocolError::UnexpectedKind {
                expected: "message or task",
                found: other.unwrap_or("none").to_string(),
            });
        }
    };
    if text.is_empty() {
        return Err(ProtocolError::NoResponseText);
    }
    Ok(text)
}

/// Extract the task ID from a non-blocking `message/send` result.
///
/// # Errors
/// Returns `ProtocolError::UnexpectedKind` unless the result is a task.
pub fn task_id(result: &Value) -> Result<String, ProtocolError> {
    match discriminant(result).as_deref() {
        Some(KIND_TASK) => Ok(Task::deserialize(result)?.id),
        other => Err(ProtocolError::UnexpectedKind {
            expected: KIND_TASK,
            found: other.unwrap_or("none").to_string(),
        }),
    }
}
