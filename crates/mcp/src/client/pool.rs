//! Per-turn pool of MCP clients and the merged tool set they expose.
//!
//! A chat turn connects to every requested server concurrently; any
//! failure fails the whole pool (a turn with silently missing tools is
//! worse than an explicit error). Tools from all servers are merged by
//! name, later servers overriding earlier ones.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use w3_domain::tool::ToolDefinition;

use crate::client::transport::{McpTransport, SseClientTransport};
use crate::error::McpError;
use crate::handler::ToolHandler;
use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One MCP server to connect to for a turn.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    pub name: String,
    pub url: String,
}

/// A connected MCP server with its discovered tools.
pub struct McpClient {
    pub name: String,
    pub tools: Vec<McpToolDef>,
    transport: Box<dyn McpTransport>,
}

impl McpClient {
    /// Connect over SSE and perform the MCP handshake.
    pub async fn connect(
        http: &reqwest::Client,
        endpoint: &ServerEndpoint,
    ) -> Result<Self, McpError> {
        let transport = SseClientTransport::connect(http, &endpoint.url).await?;
        Self::initialize(endpoint.name.clone(), Box::new(transport)).await
    }

    /// Handshake on an already-connected transport:
    /// `initialize`, then `notifications/initialized`, then `tools/list`.
    pub async fn initialize(
        name: String,
        transport: Box<dyn McpTransport>,
    ) -> Result<Self, McpError> {
        let init_params = serde_json::to_value(protocol::initialize_params())
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let resp = transport.send_request("initialize", Some(init_params)).await?;
        if let Err(err) = resp.into_result() {
            return Err(McpError::Protocol(format!("initialize failed: {err}")));
        }
        tracing::debug!(server = %name, "MCP initialize response received");

        transport.send_notification("notifications/initialized").await?;

        let tools_resp = transport.send_request("tools/list", None).await?;
        let tools = match tools_resp.into_result() {
            Ok(value) => match serde_json::from_value::<ToolsListResult>(value) {
                Ok(r) => r.tools,
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "failed to parse tools/list result");
                    Vec::new()
                }
            },
            Err(err) => {
                tracing::warn!(server = %name, error = %err, "tools/list returned error");
                Vec::new()
            }
        };

        tracing::info!(server = %name, tool_count = tools.len(), "MCP server connected");
        Ok(Self {
            name,
            tools,
            transport,
        })
    }

    /// Call a tool on this server.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        if !self.transport.is_alive() {
            return Err(McpError::ServerDown(self.name.clone()));
        }

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let resp = self.transport.send_request("tools/call", Some(params)).await?;
        let value = resp
            .into_result()
            .map_err(|err| McpError::Protocol(format!("tools/call failed: {err}")))?;
        serde_json::from_value::<ToolCallResult>(value)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    async fn close(&self) {
        tracing::debug!(server = %self.name, "closing MCP client");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Merged tool set
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool as seen by the model after merging, bound to its server.
pub struct MergedTool {
    pub description: String,
    pub input_schema: Value,
    handler: Arc<dyn ToolHandler>,
}

/// The union of every connected server's tools, keyed by tool name.
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<String, MergedTool>,
    // First-seen order, so definitions() is deterministic.
    order: Vec<String>,
}

impl ToolSet {
    fn insert(&mut self, server: &str, name: String, tool: MergedTool) {
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, server, "duplicate tool name, later server wins");
        } else {
            self.order.push(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Tool definitions in first-seen order, for the chat request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| {
                self.tools.get(name).map(|t| ToolDefinition {
                    name: name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                })
            })
            .collect()
    }

    /// Execute a tool by name. Misses come back as text so the model
    /// can see what went wrong.
    pub async fn call(&self, name: &str, arguments: Value) -> String {
        match self.tools.get(name) {
            Some(tool) => tool.handler.call(arguments).await,
            None => format!("unknown tool: {name}"),
        }
    }
}

/// Handler that forwards a tool call to its owning client.
struct RemoteTool {
    client: Arc<McpClient>,
    tool_name: String,
}

#[async_trait]
impl ToolHandler for RemoteTool {
    async fn call(&self, arguments: Value) -> String {
        match self.client.call_tool(&self.tool_name, arguments).await {
            Ok(result) if result.is_error => format!("tool error: {}", result.joined_text()),
            Ok(result) => result.joined_text(),
            Err(e) => format!("tool call failed: {e}"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolClientPool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// All MCP clients for one chat turn.
pub struct ToolClientPool {
    clients: Vec<Arc<McpClient>>,
}

impl ToolClientPool {
    /// Connect to every endpoint concurrently. Fails fast: the first
    /// connection error fails the pool, and already-established
    /// transports are torn down by drop.
    pub async fn connect(
        http: &reqwest::Client,
        endpoints: &[ServerEndpoint],
    ) -> Result<Self, McpError> {
        let futs = endpoints.iter().map(|e| McpClient::connect(http, e));
        let clients = futures_util::future::try_join_all(futs).await?;
        Ok(Self::from_clients(clients))
    }

    pub fn from_clients(clients: Vec<McpClient>) -> Self {
        Self {
            clients: clients.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Merge every client's tools into one set. On a name collision the
    /// later endpoint (connection order) wins.
    pub fn merged_tools(&self) -> ToolSet {
        let mut set = ToolSet::default();
        for client in &self.clients {
            for tool in &client.tools {
                set.insert(
                    &client.name,
                    tool.name.clone(),
                    MergedTool {
                        description: tool.description.clone(),
                        input_schema: tool.input_schema.clone(),
                        handler: Arc::new(RemoteTool {
                            client: Arc::clone(client),
                            tool_name: tool.name.clone(),
                        }),
                    },
                );
            }
        }
        set
    }

    /// Close every client. Individual failures are logged, never
    /// propagated; calling this again is harmless.
    pub async fn close_all(&self) {
        let futs: Vec<_> = self.clients.iter().map(|c| c.close()).collect();
        futures_util::future::join_all(futs).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
