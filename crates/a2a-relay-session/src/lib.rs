//! Conversation management for remote agents.
//!
//! Provides:
//! - `SessionManager` - Conversation cache and the three interaction modes
//! - `relay` - Streaming relay between the agent and a consumer
//! - Storage implementations (JSON files, memory)

pub mod manager;
pub mod relay;
pub mod storage;

pub use manager::{
    CachedConversation, ManagerError, SessionManager, SharedConversation, TurnError,
};
pub use relay::{RelayOutcome, RelayState};
