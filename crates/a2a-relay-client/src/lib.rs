//! JSON-RPC client for the remote conversational agent.
//!
//! Provides:
//! - Wire protocol types and the event decoder
//! - Line framing for server-push streams
//! - `A2aClient`, the `AgentClient` implementation over HTTP

pub mod client;
pub mod protocol;
pub mod sse;

pub use client::A2aClient;
pub use protocol::{decode_event, reply_text};
