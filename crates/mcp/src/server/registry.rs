//! Named tool servers and their session registry.
//!
//! A [`ToolServer`] is a fixed set of tools plus the JSON-RPC dispatch
//! that answers `initialize` / `tools/list` / `tools/call`. A
//! [`SessionRegistry`] wraps one server and owns its live SSE sessions:
//! opening a new session supersedes (closes) the previous active one,
//! so a reconnecting client never talks to a stale transport.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransportError;
use crate::handler::ToolHandler;
use crate::protocol::{
    initialize_result, JsonRpcResponse, McpToolDef, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::server::transport::{PostOutcome, SessionTransport, TransportEvent};
use crate::sse::SseEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool exposed by a [`ToolServer`].
pub struct ServerTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

/// A named MCP server: tool definitions plus JSON-RPC dispatch.
pub struct ToolServer {
    name: String,
    version: String,
    tools: Vec<ServerTool>,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: Vec::new(),
        }
    }

    /// Register a tool. Builder style so server modules read as a manifest.
    pub fn tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        self.tools.push(ServerTool {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn tool_defs(&self) -> Vec<McpToolDef> {
        self.tools
            .iter()
            .map(|t| McpToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Answer one inbound JSON-RPC message. Notifications yield `None`.
    pub async fn dispatch(&self, message: &Value) -> Option<JsonRpcResponse> {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");

        // No id means notification; nothing to answer.
        let id = match message.get("id").and_then(Value::as_u64) {
            Some(id) => id,
            None => {
                if method != "notifications/initialized" {
                    tracing::debug!(server = %self.name, method, "ignoring notification");
                }
                return None;
            }
        };

        let response = match method {
            "initialize" => {
                JsonRpcResponse::ok(id, initialize_result(&self.name, &self.version))
            }
            "tools/list" => match serde_json::to_value(crate::protocol::ToolsListResult {
                tools: self.tool_defs(),
            }) {
                Ok(v) => JsonRpcResponse::ok(id, v),
                Err(e) => JsonRpcResponse::err(id, INVALID_PARAMS, e.to_string()),
            },
            "tools/call" => self.dispatch_call(id, message.get("params")).await,
            other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
        };
        Some(response)
    }

    async fn dispatch_call(&self, id: u64, params: Option<&Value>) -> JsonRpcResponse {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let arguments = params
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let tool = match self.tools.iter().find(|t| t.name == name) {
            Some(t) => t,
            None => {
                return JsonRpcResponse::err(id, INVALID_PARAMS, format!("unknown tool: {name}"))
            }
        };

        tracing::debug!(server = %self.name, tool = %tool.name, "executing tool");
        let text = tool.handler.call(arguments).await;
        JsonRpcResponse::ok(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false,
            }),
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Live sessions for one tool server, keyed by session id.
pub struct SessionRegistry {
    server: ToolServer,
    sessions: Mutex<HashMap<String, Arc<SessionTransport>>>,
    active: Mutex<Option<String>>,
}

impl SessionRegistry {
    pub fn new(server: ToolServer) -> Arc<Self> {
        Arc::new(Self {
            server,
            sessions: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
        })
    }

    pub fn server_name(&self) -> &str {
        self.server.name()
    }

    /// Open a new session on `endpoint`, superseding any active one.
    ///
    /// Returns the transport (for tests and shutdown) and the receiver of
    /// outbound SSE frames the HTTP layer streams to the client. A serve
    /// loop task is spawned to answer the session's JSON-RPC traffic.
    pub fn open(
        self: &Arc<Self>,
        endpoint: &str,
    ) -> Result<(Arc<SessionTransport>, tokio::sync::mpsc::UnboundedReceiver<SseEvent>), TransportError>
    {
        let (transport, events) = SessionTransport::new(endpoint);
        let frames = transport.start()?;
        let transport = Arc::new(transport);
        let session_id = transport.session_id().to_string();

        // Supersede: at most one active session per server.
        let previous = {
            let mut active = self.active.lock();
            let mut sessions = self.sessions.lock();
            let previous = active
                .take()
                .and_then(|old_id| sessions.remove(&old_id));
            sessions.insert(session_id.clone(), Arc::clone(&transport));
            *active = Some(session_id.clone());
            previous
        };
        if let Some(old) = previous {
            tracing::info!(
                server = %self.server.name(),
                old_session = %old.session_id(),
                new_session = %session_id,
                "superseding active session"
            );
            old.close();
        }

        let registry = Arc::clone(self);
        let loop_transport = Arc::clone(&transport);
        tokio::spawn(async move {
            registry.serve(loop_transport, events).await;
        });

        // Close eagerly when the client drops the SSE body, rather than
        // waiting for the next send to fail.
        if let Some(sink_closed) = transport.sink_closed() {
            let watched = Arc::clone(&transport);
            tokio::spawn(async move {
                sink_closed.await;
                watched.close();
            });
        }

        Ok((transport, frames))
    }

    async fn serve(
        &self,
        transport: Arc<SessionTransport>,
        mut events: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(msg) => {
                    if let Some(response) = self.server.dispatch(&msg).await {
                        match serde_json::to_value(&response) {
                            Ok(v) => {
                                if let Err(e) = transport.send(&v) {
                                    tracing::debug!(
                                        server = %self.server.name(),
                                        error = %e,
                                        "failed to send response, session gone"
                                    );
                                }
                            }
                            Err(e) => {
                                tracing::error!(server = %self.server.name(), error = %e, "unserializable response")
                            }
                        }
                    }
                }
                TransportEvent::Closed => {
                    self.remove(transport.session_id());
                    break;
                }
                TransportEvent::Error(e) => {
                    tracing::warn!(server = %self.server.name(), error = %e, "transport error");
                }
            }
        }
    }

    /// Route one inbound POST to the session named in its `sessionId`.
    pub fn handle_post(
        &self,
        session_id: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> PostOutcome {
        let transport = self.sessions.lock().get(session_id).cloned();
        match transport {
            Some(t) => t.handle_incoming(content_type, body),
            None => PostOutcome {
                status: 500,
                body: serde_json::json!({ "error": "session not found" }),
            },
        }
    }

    fn remove(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
        let mut active = self.active.lock();
        if active.as_deref() == Some(session_id) {
            *active = None;
        }
    }

    /// Close every live session. Used on shutdown.
    pub fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().values().cloned().collect();
        for transport in sessions {
            transport.close();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
