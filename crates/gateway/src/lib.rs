//! `w3-gateway` — the w3chat HTTP gateway.
//!
//! Three surfaces:
//! - `POST /chat` — the streaming chat turn (NDJSON frames)
//! - `GET/POST /mcp/sse/{server}` — built-in MCP tool servers over SSE
//! - `GET /healthz`

pub mod api;
pub mod runtime;
pub mod state;
