//! `POST /chat` — the streaming chat endpoint.
//!
//! The request names the MCP servers to use for the turn; the gateway
//! connects to all of them, runs the two-phase turn, and streams NDJSON
//! frames back. A pool connect failure fails the whole request with
//! 502 before any frame is sent.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use serde::Deserialize;

use w3_domain::tool::Message;
use w3_mcp::client::{ServerEndpoint, ToolClientPool};

use crate::api::api_error;
use crate::runtime::turn::{run_turn, TurnContext};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// MCP servers to connect for this turn.
    #[serde(default)]
    pub mcp_list: Vec<McpEntry>,
    #[serde(default, rename = "userWalletAddress")]
    pub user_wallet_address: Option<String>,
}

/// One MCP server the client wants available for the turn.
#[derive(Debug, Deserialize)]
pub struct McpEntry {
    pub name: String,
    pub url: String,
}

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.messages.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "messages must not be empty");
    }

    let endpoints: Vec<ServerEndpoint> = req
        .mcp_list
        .iter()
        .map(|e| ServerEndpoint {
            name: e.name.clone(),
            url: e.url.clone(),
        })
        .collect();

    let pool = match ToolClientPool::connect(&state.http, &endpoints).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "MCP pool connect failed");
            return api_error(
                StatusCode::BAD_GATEWAY,
                format!("failed to connect MCP servers: {e}"),
            );
        }
    };
    tracing::info!(
        servers = pool.client_count(),
        messages = req.messages.len(),
        "chat turn started"
    );

    let ctx = TurnContext {
        messages: req.messages,
        wallet_address: req.user_wallet_address,
    };
    let frames = run_turn(
        Arc::clone(&state.llm),
        state.config.llm.clone(),
        Duration::from_secs(state.config.turn.deadline_secs),
        ctx,
        pool,
    )
    .map(Ok::<_, std::convert::Infallible>);

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response")
        })
}
