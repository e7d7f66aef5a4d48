//! `w3-mcp` — MCP (Model Context Protocol) over SSE for w3chat.
//!
//! Both halves of the transport live here:
//! - **Server side**: a single-session SSE transport ([`server::SessionTransport`]),
//!   a keyed session registry with supersede-on-reconnect semantics, and the
//!   JSON-RPC serve loop that answers `initialize` / `tools/list` / `tools/call`
//!   for a fixed set of named tools.
//! - **Client side**: an SSE client transport that correlates POSTed JSON-RPC
//!   requests with `message` events, plus a [`client::ToolClientPool`] that
//!   connects to N servers concurrently and merges their tools into one set
//!   for a chat turn.
//!
//! # Usage
//!
//! ```rust,ignore
//! use w3_mcp::client::{ServerEndpoint, ToolClientPool};
//!
//! let pool = ToolClientPool::connect(&http, &endpoints).await?;
//! let tools = pool.merged_tools();
//! let text = tools.call("token_security", json!({"token_address": "0x..."})).await;
//! pool.close_all().await;
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod sse;

// Re-exports for convenience.
pub use error::{McpError, TransportError};
pub use handler::ToolHandler;
pub use protocol::McpToolDef;
