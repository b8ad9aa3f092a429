//! Core abstractions for relaying named conversations to a remote agent.
//!
//! This crate provides the fundamental building blocks:
//! - `Conversation` - The durable record of one conversation
//! - `Event` - Protocol-agnostic streaming event vocabulary
//! - `CallStats` - Process-wide call counters
//! - Store, agent client and call recorder traits

pub mod event;
pub mod record;
pub mod stats;
pub mod traits;

pub use event::{Event, TaskState};
pub use record::{Continuation, Conversation, ConversationInfo, DEFAULT_CONVERSATION_NAME};
pub use stats::{CallRecorder, CallStats, StatsSnapshot};
pub use traits::{AgentClient, ConversationStore, EventStream, ProtocolError, StoreError};
