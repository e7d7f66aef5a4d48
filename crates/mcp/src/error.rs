//! Error types shared by both transport halves.

/// Errors that can occur during transport operations (either side).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `start()` was called on a transport that already started.
    #[error("SSE transport already started")]
    AlreadyStarted,

    /// A send was attempted before `start()` or after the stream closed.
    #[error("not connected")]
    NotConnected,

    /// An inbound POST body was valid JSON but not a structured message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The server never announced (or announced a malformed) endpoint event.
    #[error("bad endpoint: {0}")]
    Endpoint(String),

    #[error("timeout waiting for response")]
    Timeout,

    /// The SSE stream ended while requests were still pending.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Errors specific to MCP client operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server is down: {0}")]
    ServerDown(String),
}

impl From<McpError> for w3_domain::error::Error {
    fn from(e: McpError) -> Self {
        w3_domain::error::Error::Other(e.to_string())
    }
}
