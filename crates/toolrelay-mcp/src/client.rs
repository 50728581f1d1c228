//! MCP client implementation.
//!
//! This module provides the `McpConnection` for managing individual server connections
//! and `McpClient` for managing multiple servers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use toolrelay_core::McpServerConfig;
use tracing::{debug, error, info, warn};

use crate::error::{McpError, TransportError};
use crate::protocol::{
    response_id, CallToolParams, CallToolResult, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpToolDefinition,
    RequestId, ServerInfo,
};
use crate::tools::McpTool;
use crate::transport::{HttpTransport, Transport};

/// Connection state for an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Connected but not initialized.
    Connected,
    /// Connection established and initialized.
    Ready,
    /// Connection is being closed.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Ready => write!(f, "ready"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// A connection to a single MCP server.
pub struct McpConnection {
    /// Server name.
    name: String,
    /// Endpoint URL.
    url: String,
    /// Transport for communication.
    transport: Mutex<Box<dyn Transport>>,
    /// Current connection state.
    state: RwLock<ConnectionState>,
    /// Server identity reported during initialization.
    server_info: RwLock<Option<ServerInfo>>,
    /// Cached tools from the server.
    cached_tools: RwLock<Vec<McpToolDefinition>>,
    /// Request ID counter.
    request_counter: AtomicU64,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

impl McpConnection {
    /// Create a new connection with an existing transport.
    pub fn new(name: impl Into<String>, url: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport: Mutex::new(transport),
            state: RwLock::new(ConnectionState::Connected),
            server_info: RwLock::new(None),
            cached_tools: RwLock::new(Vec::new()),
            request_counter: AtomicU64::new(1),
        }
    }

    /// Build a connection over the HTTP transport for `config` without
    /// contacting the server.
    pub fn http(config: &McpServerConfig) -> Result<Arc<Self>, McpError> {
        let transport = HttpTransport::new(&config.url, &config.headers)?;
        Ok(Arc::new(Self::new(&config.name, &config.url, Box::new(transport))))
    }

    /// Open the HTTP transport for `config` and run the MCP handshake.
    ///
    /// A failed handshake closes the transport before returning.
    pub async fn connect(config: &McpServerConfig) -> Result<Arc<Self>, McpError> {
        let connection = Self::http(config)?;
        connection.handshake().await?;
        Ok(connection)
    }

    async fn handshake(&self) -> Result<(), McpError> {
        info!(server = %self.name, url = %self.url, "Connecting to MCP server");

        if let Err(e) = self.initialize().await {
            self.disconnect().await;
            return Err(e);
        }
        Ok(())
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if the connection is ready for use.
    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == ConnectionState::Ready
    }

    /// Server identity from the handshake.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    /// Get the cached tools.
    pub async fn tools(&self) -> Vec<McpToolDefinition> {
        self.cached_tools.read().await.clone()
    }

    /// Generate a new request ID.
    fn next_request_id(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn require(&self, expected: ConnectionState) -> Result<(), McpError> {
        let state = *self.state.read().await;
        if state != expected {
            return Err(McpError::invalid_state(expected.to_string(), state.to_string()));
        }
        Ok(())
    }

    /// Send a request and wait for the response with the matching id.
    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R, McpError>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = RequestId::from(self.next_request_id());
        let request = JsonRpcRequest::new(id.clone(), method, params);
        let request_json = serde_json::to_string(&request)?;

        let mut transport = self.transport.lock().await;
        transport.send(&request_json).await?;

        // Server notifications may precede the response
        let response = loop {
            let message = match transport.receive().await {
                Ok(message) => message,
                Err(TransportError::NoPendingResponse) => {
                    return Err(McpError::protocol(format!(
                        "server sent no response to '{}'",
                        method
                    )));
                }
                Err(e) => return Err(e.into()),
            };

            let value: Value = serde_json::from_str(&message)
                .map_err(|e| McpError::protocol(format!("Failed to parse message: {}", e)))?;

            if response_id(&value).as_ref() == Some(&id) {
                break value;
            }
            debug!(server = %self.name, message = %message, "Skipping unrelated message");
        };

        let response: JsonRpcResponse<R> = serde_json::from_value(response)
            .map_err(|e| McpError::protocol(format!("Failed to parse response: {}", e)))?;

        response.into_result()
    }

    /// Send a notification (no response expected).
    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<(), McpError>
    where
        P: serde::Serialize,
    {
        let notification = JsonRpcNotification::new(method, params);
        let notification_json = serde_json::to_string(&notification)?;

        let mut transport = self.transport.lock().await;
        transport.send(&notification_json).await?;

        Ok(())
    }

    /// Initialize the connection with the server.
    pub async fn initialize(&self) -> Result<(), McpError> {
        self.require(ConnectionState::Connected).await?;

        debug!(server = %self.name, "Initializing MCP connection");

        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await
            .map_err(|e| match e {
                McpError::ServerError { code, message } => {
                    McpError::init_failed(format!("server rejected initialize ({}): {}", code, message))
                }
                other => other,
            })?;

        self.notify::<()>("notifications/initialized", None).await?;

        *self.state.write().await = ConnectionState::Ready;

        info!(
            server = %self.name,
            server_name = %result.server_info.name,
            protocol_version = %result.protocol_version,
            "MCP connection initialized"
        );

        *self.server_info.write().await = Some(result.server_info);

        Ok(())
    }

    /// List available tools from the server, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        self.require(ConnectionState::Ready).await?;

        debug!(server = %self.name, "Listing tools");

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        *self.cached_tools.write().await = tools.clone();

        debug!(server = %self.name, tool_count = tools.len(), "Listed tools");

        Ok(tools)
    }

    /// List tools and wrap each one as a callable bound to this connection.
    pub async fn load_tools(self: &Arc<Self>) -> Result<Vec<McpTool>, McpError> {
        let definitions = self.list_tools().await?;
        Ok(definitions
            .into_iter()
            .map(|def| McpTool::new(Arc::clone(self), def))
            .collect())
    }

    /// Call a tool on the server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, McpError> {
        self.require(ConnectionState::Ready).await?;

        debug!(server = %self.name, tool = name, "Calling tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            warn!(server = %self.name, tool = name, "Tool returned error");
        }

        Ok(result)
    }

    /// Close the connection. Safe to call in any state and more than once.
    pub async fn disconnect(&self) {
        {
            let mut state = self.state.write().await;
            if matches!(*state, ConnectionState::Disconnected | ConnectionState::Closing) {
                return;
            }
            *state = ConnectionState::Closing;
        }

        debug!(server = %self.name, "Closing MCP connection");

        if let Err(e) = self.transport.lock().await.close().await {
            warn!(server = %self.name, error = %e, "Error while closing MCP transport");
        }

        *self.state.write().await = ConnectionState::Disconnected;
        self.cached_tools.write().await.clear();

        info!(server = %self.name, "MCP connection closed");
    }
}

/// Client for managing multiple MCP server connections.
///
/// Connections are kept in the order their servers were configured.
pub struct McpClient {
    connections: RwLock<Vec<Arc<McpConnection>>>,
}

impl McpClient {
    /// Create a new MCP client.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
        }
    }

    /// Connect to one server and load its tools.
    ///
    /// The connection is recorded in `started` before the handshake begins.
    async fn open(
        config: &McpServerConfig,
        started: &Mutex<Vec<Arc<McpConnection>>>,
    ) -> Result<(Arc<McpConnection>, Vec<McpTool>), McpError> {
        let connection = McpConnection::http(config)?;
        started.lock().await.push(Arc::clone(&connection));

        connection.handshake().await?;
        match connection.load_tools().await {
            Ok(tools) => {
                info!(server = %config.name, count = tools.len(), "Connected to MCP server");
                Ok((connection, tools))
            }
            Err(e) => {
                connection.disconnect().await;
                Err(e)
            }
        }
    }

    /// Connect to every enabled server concurrently and load their tools.
    ///
    /// Tools come back grouped by server in configuration order, whatever
    /// order the servers answer in. The first failure cancels the attempts
    /// still in flight, and every connection any attempt started is
    /// disconnected before the error is returned; nothing is tracked by the
    /// client in that case.
    pub async fn connect_all(&self, configs: &[McpServerConfig]) -> Result<Vec<McpTool>, McpError> {
        let registry = Mutex::new(Vec::new());
        let started = &registry;

        let mut pending = configs
            .iter()
            .filter(|c| c.enabled)
            .enumerate()
            .map(|(index, config)| async move {
                Self::open(config, started)
                    .await
                    .map(|opened| (index, opened))
                    .map_err(|e| McpError::connect(&config.name, e))
            })
            .collect::<FuturesUnordered<_>>();

        let mut opened = Vec::new();
        let mut failure = None;
        while let Some(result) = pending.next().await {
            match result {
                Ok(entry) => opened.push(entry),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(pending);

        if let Some(e) = failure {
            error!(error = %e, "MCP setup failed, closing started connections");
            // Cancelled attempts may hold a session mid-handshake or mid-listing
            for connection in registry.into_inner() {
                connection.disconnect().await;
            }
            return Err(e);
        }

        opened.sort_by_key(|(index, _)| *index);

        let mut connections = self.connections.write().await;
        let mut tools = Vec::new();
        for (_, (connection, server_tools)) in opened {
            connections.push(connection);
            tools.extend(server_tools);
        }

        Ok(tools)
    }

    /// Disconnect from all servers and forget them.
    pub async fn disconnect_all(&self) {
        let connections: Vec<Arc<McpConnection>> = {
            let mut connections = self.connections.write().await;
            connections.drain(..).collect()
        };

        for connection in &connections {
            connection.disconnect().await;
        }

        if !connections.is_empty() {
            info!(count = connections.len(), "Closed MCP connections");
        }
    }

    /// Get a connection by server name.
    pub async fn get(&self, name: &str) -> Option<Arc<McpConnection>> {
        self.connections
            .read()
            .await
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// List connected server names in order.
    pub async fn list_servers(&self) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Number of tracked connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are tracked.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Scripted transport: every send pops the next batch of replies.
    struct ScriptedTransport {
        replies: VecDeque<Vec<Value>>,
        inbox: VecDeque<String>,
        sent: Arc<std::sync::Mutex<Vec<Value>>>,
        connected: bool,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Vec<Value>>) -> (Self, Arc<std::sync::Mutex<Vec<Value>>>) {
            let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
            (
                Self {
                    replies: replies.into(),
                    inbox: VecDeque::new(),
                    sent: Arc::clone(&sent),
                    connected: true,
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(serde_json::from_str(message).unwrap());
            if let Some(batch) = self.replies.pop_front() {
                self.inbox.extend(batch.iter().map(Value::to_string));
            }
            Ok(())
        }

        async fn receive(&mut self) -> Result<String, TransportError> {
            self.inbox.pop_front().ok_or(TransportError::NoPendingResponse)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn init_reply(id: u64) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "scripted"}
            }
        })
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }

    #[tokio::test]
    async fn test_list_tools_requires_ready() {
        let (transport, _) = ScriptedTransport::new(vec![]);
        let conn = McpConnection::new("s", "http://x", Box::new(transport));

        let err = conn.list_tools().await.unwrap_err();
        assert!(err.is_state_error());
    }

    #[tokio::test]
    async fn test_request_skips_notifications() {
        let (transport, sent) = ScriptedTransport::new(vec![
            vec![init_reply(1)],
            vec![],
            vec![
                serde_json::json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}),
                serde_json::json!({"jsonrpc": "2.0", "id": 2, "result": {
                    "tools": [{"name": "fetch_news"}],
                    "nextCursor": "page2"
                }}),
            ],
            vec![serde_json::json!({"jsonrpc": "2.0", "id": 3, "result": {
                "tools": [{"name": "fetch_stock_info", "description": "Quote"}]
            }})],
        ]);
        let conn = Arc::new(McpConnection::new("s", "http://x", Box::new(transport)));

        conn.initialize().await.unwrap();
        assert!(conn.is_ready().await);
        assert_eq!(conn.server_info().await.unwrap().name, "scripted");

        let tools = conn.load_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.tool_name().to_string()).collect();
        assert_eq!(names, vec!["fetch_news", "fetch_stock_info"]);

        let sent = sent.lock().unwrap();
        assert_eq!(sent[1]["method"], "notifications/initialized");
        assert!(sent[1].get("id").is_none());
        assert_eq!(sent[3]["params"]["cursor"], "page2");
    }

    #[tokio::test]
    async fn test_server_error_response() {
        let (transport, _) = ScriptedTransport::new(vec![
            vec![init_reply(1)],
            vec![],
            vec![serde_json::json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "no tools"}})],
        ]);
        let conn = McpConnection::new("s", "http://x", Box::new(transport));
        conn.initialize().await.unwrap();

        let err = conn.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::ServerError { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_missing_response_is_protocol_error() {
        let (transport, _) = ScriptedTransport::new(vec![]);
        let conn = McpConnection::new("s", "http://x", Box::new(transport));

        let err = conn.initialize().await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(ref m) if m.contains("initialize")));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (transport, _) = ScriptedTransport::new(vec![vec![init_reply(1)]]);
        let conn = McpConnection::new("s", "http://x", Box::new(transport));
        conn.initialize().await.unwrap();

        conn.disconnect().await;
        conn.disconnect().await;
        assert_eq!(conn.state().await, ConnectionState::Disconnected);
        assert!(conn.call_tool("x", None).await.unwrap_err().is_state_error());
    }

    #[tokio::test]
    async fn test_mcp_client_new() {
        let client = McpClient::new();
        assert!(client.list_servers().await.is_empty());
        assert!(client.is_empty().await);
        assert!(client.connect_all(&[]).await.unwrap().is_empty());
        client.disconnect_all().await;
    }
}
