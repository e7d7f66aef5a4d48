//! `GET`/`POST /mcp/sse/:server` — the server side of the MCP transport.
//!
//! GET opens the SSE stream: the first frame is an `endpoint` event
//! telling the client where to POST, every later frame is a `message`
//! event carrying a JSON-RPC response. POST delivers one JSON-RPC
//! message for the session named in its `sessionId` query parameter and
//! is acknowledged with 202 before the message is processed.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::api::api_error;
use crate::state::AppState;

pub async fn open(State(state): State<AppState>, Path(server): Path<String>) -> Response {
    let Some(registry) = state.mounts.get(&server) else {
        return api_error(
            StatusCode::NOT_FOUND,
            format!("unknown MCP server: {server}"),
        );
    };

    let endpoint = format!("/mcp/sse/{server}");
    let (transport, frames) = match registry.open(&endpoint) {
        Ok(pair) => pair,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    tracing::info!(
        server = %server,
        session = %transport.session_id(),
        "SSE session opened"
    );

    let body = UnboundedReceiverStream::new(frames)
        .map(|event| Ok::<_, std::convert::Infallible>(Bytes::from(event.to_wire())));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response")
        })
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn message(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(registry) = state.mounts.get(&server) else {
        return api_error(
            StatusCode::NOT_FOUND,
            format!("unknown MCP server: {server}"),
        );
    };
    let Some(session_id) = query.session_id else {
        return api_error(StatusCode::BAD_REQUEST, "missing sessionId query parameter");
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let outcome = registry.handle_post(&session_id, content_type, &body);
    let status =
        StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.body)).into_response()
}
