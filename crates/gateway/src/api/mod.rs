//! HTTP surface.
//!
//! - `GET  /healthz`            — liveness probe
//! - `POST /chat`               — streaming chat turn (NDJSON)
//! - `GET  /mcp/sse/:server`    — open an MCP SSE session
//! - `POST /mcp/sse/:server`    — deliver one JSON-RPC message to a session

pub mod chat;
pub mod health;
pub mod mcp_sse;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/chat", post(chat::chat))
        .route(
            "/mcp/sse/:server",
            get(mcp_sse::open).post(mcp_sse::message),
        )
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use w3_domain::config::Config;
    use w3_domain::error::Result;
    use w3_domain::stream::{BoxStream, FinishReason, StreamEvent};
    use w3_mcp::server::{SessionRegistry, ToolServer};
    use w3_providers::traits::{GenerationRequest, LlmProvider};

    struct StubLlm;

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn chat_stream(
            &self,
            _req: &GenerationRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            Ok(Box::pin(futures_util::stream::iter(vec![
                Ok(StreamEvent::Token {
                    text: "hello".into(),
                }),
                Ok(StreamEvent::Done {
                    usage: None,
                    finish_reason: FinishReason::Stop,
                }),
            ])))
        }

        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    fn test_app() -> Router {
        let server = ToolServer::new("echo-mcp-server", "1.0.0").tool(
            "echo",
            "Echo the input back",
            json!({ "type": "object", "properties": {} }),
            Arc::new(|args: Value| async move { format!("echo: {args}") }),
        );
        let mut mounts = HashMap::new();
        mounts.insert("echo".to_string(), SessionRegistry::new(server));

        let state = AppState {
            config: Arc::new(Config::default()),
            llm: Arc::new(StubLlm),
            http: reqwest::Client::new(),
            mounts: Arc::new(mounts),
        };
        router().with_state(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_mounted_servers() {
        let response = test_app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mcp_servers"], json!(["echo"]));
    }

    #[tokio::test]
    async fn unknown_mount_is_404() {
        let response = test_app()
            .oneshot(Request::get("/mcp/sse/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sse_open_announces_endpoint_first() {
        let response = test_app()
            .oneshot(Request::get("/mcp/sse/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        // The session stays open, so only pull the first frame.
        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let wire = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(wire.starts_with("event: endpoint\n"), "got: {wire}");
        assert!(wire.contains("/mcp/sse/echo?sessionId="));
    }

    #[tokio::test]
    async fn post_without_session_id_is_400() {
        let response = test_app()
            .oneshot(
                Request::post("/mcp/sse/echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_to_unknown_session_is_500() {
        let response = test_app()
            .oneshot(
                Request::post("/mcp/sse/echo?sessionId=gone")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn chat_rejects_empty_messages() {
        let response = test_app()
            .oneshot(
                Request::post("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"messages":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_streams_ndjson_frames() {
        let request = json!({
            "messages": [{ "role": "user", "content": "hi" }]
        });
        let response = test_app()
            .oneshot(
                Request::post("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(request.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let frames: Vec<Value> = String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "token");
        assert_eq!(frames[0]["text"], "hello");
        assert_eq!(frames[1]["type"], "done");
    }
}
