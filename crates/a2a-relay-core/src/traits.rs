//! Core traits for conversation storage and agent calls.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::{Continuation, Conversation, ConversationInfo, Event};

/// Storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("Conversation already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid conversation id: {0:?}")]
    InvalidId(String),
    #[error("Corrupt conversation file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Trait for durable conversation storage.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create and persist an empty conversation.
    async fn create(&self, id: &str, working_dir: &str) -> Result<Conversation, StoreError>;

    /// Load a conversation.
    async fn load(&self, id: &str) -> Result<Conversation, StoreError>;

    /// Replace the stored conversation, stamping its last access time.
    async fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError>;

    /// Delete a conversation.
    ///
    /// Deleting an absent conversation succeeds, including one whose
    /// identifier could never have been stored.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// List stored conversations, skipping unreadable entries.
    async fn list(&self) -> Result<Vec<ConversationInfo>, StoreError>;
}

/// Agent protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Agent returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Agent returned RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Expected a {expected} result, got {found:?}")]
    UnexpectedKind {
        expected: &'static str,
        found: String,
    },
    #[error("no response text")]
    NoResponseText,
    #[error("Malformed agent response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Stream error: {0}")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Lazy, finite sequence of events from one streaming call.
pub type EventStream = BoxStream<'static, Result<Event, ProtocolError>>;

/// Trait for the remote agent's three call shapes.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send a prompt and wait for the agent's reply text.
    async fn send_message(&self, context_id: &str, prompt: &str) -> Result<String, ProtocolError>;

    /// Send a prompt as a non-blocking task, returning the task ID.
    async fn send_task(&self, context_id: &str, prompt: &str) -> Result<String, ProtocolError>;

    /// Send a prompt and stream the agent's events.
    async fn stream_message(
        &self,
        continuation: &Continuation,
        prompt: &str,
    ) -> Result<EventStream, ProtocolError>;
}
