//! The durable conversation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::StoreError;

/// Name given to a conversation until its first turn completes.
pub const DEFAULT_CONVERSATION_NAME: &str = "New Conversation";

const NAME_WORDS: usize = 5;
const NAME_MAX_CHARS: usize = 50;

const USER_PREFIX: &str = "User: ";
const AGENT_PREFIX: &str = "Agent: ";

/// A named, persisted sequence of user/agent turns.
///
/// History lines alternate `User: ...` / `Agent: ...`; after every
/// completed turn the history length is even.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque, filesystem-safe identifier.
    pub id: String,
    /// Display name, derived from the first prompt.
    pub name: String,
    /// Ordered history lines.
    #[serde(default)]
    pub history: Vec<String>,
    /// Last time the conversation was used or written.
    pub last_access: DateTime<Utc>,
    /// Working directory / context path supplied at creation.
    #[serde(default)]
    pub working_directory: String,
    /// Remote agent context handle echoed on the next streaming call.
    #[serde(default)]
    pub context_id: Option<String>,
    /// Remote agent task handle echoed on the next streaming call.
    #[serde(default)]
    pub task_id: Option<String>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new(id: impl Into<String>, working_directory: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: DEFAULT_CONVERSATION_NAME.to_string(),
            history: Vec::new(),
            last_access: Utc::now(),
            working_directory: working_directory.into(),
            context_id: None,
            task_id: None,
        }
    }

    /// Whether no turn has been recorded yet.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.history.is_empty()
    }

    /// Record a completed turn.
    ///
    /// The display name is derived from `prompt` when this is the first turn.
    pub fn record_turn(&mut self, prompt: &str, reply: &str) {
        if self.is_fresh() {
            self.name = derive_name(prompt);
        }
        self.history.push(format!("{USER_PREFIX}{prompt}"));
        self.history.push(format!("{AGENT_PREFIX}{reply}"));
    }

    /// Current continuation handles.
    #[must_use]
    pub fn continuation(&self) -> Continuation {
        Continuation {
            context_id: self.context_id.clone(),
            task_id: self.task_id.clone(),
        }
    }

    /// Adopt continuation handles reported by the agent.
    ///
    /// Absent or empty handles leave the current value untouched.
    pub fn adopt_continuation(&mut self, context_id: Option<&str>, task_id: Option<&str>) {
        if let Some(ctx) = context_id.filter(|c| !c.is_empty()) {
            self.context_id = Some(ctx.to_string());
        }
        if let Some(task) = task_id.filter(|t| !t.is_empty()) {
            self.task_id = Some(task.to_string());
        }
    }

    /// Mark the record as used now.
    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    /// Identifier and display name.
    #[must_use]
    pub fn info(&self) -> ConversationInfo {
        ConversationInfo {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Listing entry for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    pub name: String,
}

/// Continuation handles sent along with a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuation {
    pub context_id: Option<String>,
    pub task_id: Option<String>,
}

/// Derive a display name from a first prompt.
///
/// Up to five whitespace-delimited words, joined by single spaces and cut
/// to at most fifty characters.
#[must_use]
pub fn derive_name(prompt: &str) -> String {
    let joined = prompt
        .split_whitespace()
        .take(NAME_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(NAME_MAX_CHARS).collect()
}

/// Check that an identifier can safely name a file.
///
/// # Errors
/// Returns `StoreError::InvalidId` for empty identifiers, identifiers
/// starting with `.`, or any character outside `[A-Za-z0-9._-]`.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let safe = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}
