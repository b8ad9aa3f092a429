//! Protocol-agnostic streaming events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    AuthRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether the task can make no further progress.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Failed | Self::Rejected
        )
    }
}

/// One event produced by a streaming agent call.
///
/// Events are forwarded to consumers unchanged, so they serialize with a
/// `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A complete agent message.
    Message {
        context_id: Option<String>,
        task_id: Option<String>,
        text_parts: Vec<String>,
    },
    /// The agent created (or reported) a task.
    TaskCreated {
        context_id: Option<String>,
        task_id: Option<String>,
        state: TaskState,
    },
    /// A task changed state, possibly carrying a message.
    TaskStatusUpdate {
        context_id: Option<String>,
        task_id: Option<String>,
        state: TaskState,
        message: Option<Vec<String>>,
    },
    /// A chunk of a task artifact.
    ArtifactUpdate {
        context_id: Option<String>,
        task_id: Option<String>,
        text_parts: Vec<String>,
        last_chunk: bool,
    },
    /// A record whose discriminant was not recognized.
    Unknown { raw: Value },
}

impl Event {
    /// Short name of the variant, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::TaskCreated { .. } => "task",
            Self::TaskStatusUpdate { .. } => "status-update",
            Self::ArtifactUpdate { .. } => "artifact-update",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Continuation handles carried by the event, if any.
    #[must_use]
    pub fn continuation(&self) -> Option<(Option<&str>, Option<&str>)> {
        match self {
            Self::Message {
                context_id,
                task_id,
                ..
            }
            | Self::TaskCreated {
                context_id,
                task_id,
                ..
            }
            | Self::TaskStatusUpdate {
                context_id,
                task_id,
                ..
            }
            | Self::ArtifactUpdate {
                context_id,
                task_id,
                ..
            } => Some((context_id.as_deref(), task_id.as_deref())),
            Self::Unknown { .. } => None,
        }
    }

    /// Text that belongs in the visible reply.
    ///
    /// Artifact text is observational and never part of the reply.
    #[must_use]
    pub fn visible_text(&self) -> Option<String> {
        match self {
            Self::Message { text_parts, .. } => Some(text_parts.concat()),
            Self::TaskStatusUpdate {
                message: Some(parts),
                ..
            } => Some(parts.concat()),
            _ => None,
        }
    }
}
