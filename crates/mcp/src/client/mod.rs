//! Client half: SSE transport, per-server client, and the turn pool.

mod pool;
mod transport;

pub use pool::{McpClient, MergedTool, ServerEndpoint, ToolClientPool, ToolSet};
pub use transport::{McpTransport, SseClientTransport};
