//! HTTP client for the remote agent.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use a2a_relay_core::{AgentClient, Continuation, Event, EventStream, ProtocolError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::protocol::{
    self, METHOD_SEND, METHOD_STREAM, Message, MessageSendParams, RpcRequest, RpcResponse,
    SendConfiguration,
};
use crate::sse::{LineFramer, data_payload};

/// Default timeout for request/response calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

fn transport(e: reqwest::Error) -> ProtocolError {
    ProtocolError::Transport(Box::new(e))
}

/// Agent client speaking JSON-RPC over HTTP.
///
/// The underlying connection pool is reused across calls; no other state
/// is shared between calls.
pub struct A2aClient {
    http: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl A2aClient {
    /// Create a client for the agent at `base_url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProtocolError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(transport)?;
        Ok(Self::with_http_client(http, base_url))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    /// Override the timeout for request/response calls.
    ///
    /// Streaming calls are never cut short by this timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Agent endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check whether the agent publishes its agent card.
    pub async fn probe(&self) -> bool {
        let url = format!("{}{AGENT_CARD_PATH}", self.endpoint);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Agent card probe failed");
                false
            }
        }
    }

    fn request(
        &self,
        method: &'static str,
        params: MessageSendParams,
    ) -> RpcRequest<MessageSendParams> {
        RpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params)
    }

    async fn call(&self, params: MessageSendParams) -> Result<Value, ProtocolError> {
        let request = self.request(METHOD_SEND, params);
        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %body, "Agent returned non-success status");
            return Err(ProtocolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = serde_json::from_str(&body)?;
        envelope.into_result()
    }
}

#[async_trait]
impl AgentClient for A2aClient {
    async fn send_message(&self, context_id: &str, prompt: &str) -> Result<String, ProtocolError> {
        let result = self
            .call(MessageSendParams {
                message: Message::user(prompt, Some(context_id), None),
                configuration: None,
            })
            .await?;
        protocol::reply_text(&result)
    }

    async fn send_task(&self, context_id: &str, prompt: &str) -> Result<String, ProtocolError> {
        let result = self
            .call(MessageSendParams {
                message: Message::user(prompt, Some(context_id), None),
                configuration: Some(SendConfiguration { blocking: false }),
            })
            .await?;
        protocol::task_id(&result)
    }

    async fn stream_message(
        &self,
        continuation: &Continuation,
        prompt: &str,
    ) -> Result<EventStream, ProtocolError> {
        let request = self.request(
            METHOD_STREAM,
            MessageSendParams {
                message: Message::user(
                    prompt,
                    continuation.context_id.as_deref(),
                    continuation.task_id.as_deref(),
                ),
                configuration: None,
            },
        );
        let resp = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProtocolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut framer = LineFramer::default();
            futures::pin_mut!(bytes);

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "Agent stream read failed");
                        yield Err(ProtocolError::Stream(Box::new(e)));
                        return;
                    }
                };
                framer.push(&chunk);
                while let Some(line) = framer.next_line() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!(error = %e, "Agent stream line too long");
                            yield Err(ProtocolError::Stream(Box::new(e)));
                            return;
                        }
                    };
                    match decode_line(&line) {
                        Ok(Some(event)) => {
                            yield Ok(event);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            if let Some(line) = framer.finish() {
                match decode_line(&line) {
                    Ok(Some(event)) => {
                        yield Ok(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                    }
                }
            }
            tracing::debug!("Agent stream closed");
        };
        Ok(Box::pin(stream))
    }
}

/// Decode one framed line of a stream.
///
/// Non-data lines are skipped. Data that is not valid JSON, or carries no
/// result, surfaces as `Event::Unknown`; an RPC error ends the stream.
fn decode_line(line: &str) -> Result<Option<Event>, ProtocolError> {
    let Some(data) = data_payload(line) else {
        return Ok(None);
    };
    tracing::trace!(data, "Agent stream record");

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable stream record");
            return Ok(Some(Event::Unknown {
                raw: Value::String(data.to_string()),
            }));
        }
    };

    let envelope = match RpcResponse::deserialize(&value) {
        Ok(envelope) => envelope,
        Err(_) => return Ok(Some(Event::Unknown { raw: value })),
    };
    if envelope.error.is_none() && envelope.result.is_none() {
        return Ok(Some(Event::Unknown { raw: value }));
    }
    envelope
        .into_result()
        .map(|result| Some(protocol::decode_event(result)))
}
