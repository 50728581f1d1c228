//! MCP transport implementations.
//!
//! The transport layer moves raw JSON-RPC messages between client and server.
//! [`HttpTransport`] implements the streamable HTTP transport: each outgoing
//! message is a `POST`, and the server answers with either a JSON body or an
//! SSE stream carrying one or more messages.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::protocol::response_id;
use crate::sse::SseParser;

/// Header carrying the server-assigned session.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Trait for MCP transport implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message to the server.
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Receive a message from the server.
    async fn receive(&mut self) -> Result<String, TransportError>;

    /// Close the transport connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Streamable HTTP transport for remote MCP servers.
pub struct HttpTransport {
    client: Client,
    url: Url,
    headers: HeaderMap,
    session_id: Option<String>,
    /// Messages received but not yet consumed by `receive`.
    incoming: VecDeque<String>,
    connected: bool,
}

impl HttpTransport {
    /// Create a transport for `url`, sending `headers` with every request.
    pub fn new(url: &str, headers: &BTreeMap<String, String>) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(key.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| TransportError::InvalidHeader(key.clone()))?;
            header_map.insert(name, value);
        }

        Ok(Self {
            client: Client::new(),
            url: parsed,
            headers: header_map,
            session_id: None,
            incoming: VecDeque::new(),
            connected: true,
        })
    }

    /// The session assigned by the server, once one has been.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn remember_session(&mut self, response: &Response) {
        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(id) {
                debug!(session = id, "MCP session assigned");
                self.session_id = Some(id.to_string());
            }
        }
    }

    /// Queue a JSON body. Batches are split into their elements.
    fn queue_json(&mut self, body: &str) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(items)) => {
                self.incoming.extend(items.iter().map(Value::to_string));
            }
            _ => self.incoming.push_back(body.to_string()),
        }
    }

    /// Read an SSE body, queueing every message until a response arrives.
    async fn read_event_stream(&mut self, response: Response) -> Result<(), TransportError> {
        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                if self.queue_event_data(event.is_message(), event.data) {
                    return Ok(());
                }
            }
        }

        if let Some(event) = parser.finish() {
            self.queue_event_data(event.is_message(), event.data);
        }
        Ok(())
    }

    /// Returns true once a JSON-RPC response has been queued.
    fn queue_event_data(&mut self, is_message: bool, data: String) -> bool {
        if !is_message || data.trim().is_empty() {
            return false;
        }
        let is_response = serde_json::from_str::<Value>(&data)
            .map(|v| response_id(&v).is_some())
            .unwrap_or(false);
        self.incoming.push_back(data);
        is_response
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        debug!(url = %self.url, message = message, "Sending message to MCP server");

        let mut request = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_string());

        if let Some(ref session) = self.session_id {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.remember_session(&response);

        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);

        if is_event_stream {
            self.read_event_stream(response).await
        } else {
            let body = response.text().await?;
            self.queue_json(&body);
            Ok(())
        }
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        let message = self
            .incoming
            .pop_front()
            .ok_or(TransportError::NoPendingResponse)?;

        debug!(message = %message, "Received message from MCP server");

        Ok(message)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }

        self.connected = false;
        self.incoming.clear();

        let Some(session) = self.session_id.take() else {
            return Ok(());
        };

        debug!(url = %self.url, session = %session, "Terminating MCP session");

        let response = self
            .client
            .delete(self.url.clone())
            .headers(self.headers.clone())
            .header(SESSION_HEADER, &session)
            .send()
            .await?;

        // 405 means the server doesn't support explicit termination
        let status = response.status();
        if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
            warn!(status = status.as_u16(), "MCP session termination rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
