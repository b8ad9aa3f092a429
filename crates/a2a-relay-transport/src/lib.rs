//! HTTP and WebSocket transport for conversations.
//!
//! Provides:
//! - Wire types (JSON)
//! - REST routes over the session manager
//! - WebSocket prompt streaming (feature: websocket)

pub mod error;
pub mod protocol;
pub mod routes;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::ApiError;
pub use protocol::{PromptReply, PromptRequest, ServerMessage};
pub use routes::{AppState, router};
