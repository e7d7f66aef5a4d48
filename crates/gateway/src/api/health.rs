use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut servers: Vec<&str> = state.mounts.keys().map(String::as_str).collect();
    servers.sort_unstable();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mcp_servers": servers,
    }))
}
