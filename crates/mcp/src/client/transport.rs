//! Client-side MCP transport over SSE + POST.
//!
//! The server's SSE stream announces a POST endpoint (carrying the
//! session id) and then delivers JSON-RPC responses as `message` events.
//! Requests go out as plain HTTP POSTs; a background reader task routes
//! each response to the caller that is waiting on its id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse::drain_events;

/// How long to wait for the server's `endpoint` announcement.
const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);
/// How long to wait for any single JSON-RPC response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for MCP client transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the transport is still alive.
    fn is_alive(&self) -> bool;

    /// Shut down the transport gracefully. Idempotent.
    async fn shutdown(&self);
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// SSE transport: one GET stream inbound, POSTs outbound.
pub struct SseClientTransport {
    http: reqwest::Client,
    post_url: reqwest::Url,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseClientTransport {
    /// Connect to an MCP SSE server and wait for its endpoint announcement.
    pub async fn connect(http: &reqwest::Client, url: &str) -> Result<Self, TransportError> {
        let base =
            reqwest::Url::parse(url).map_err(|e| TransportError::Endpoint(e.to_string()))?;

        let response = http
            .get(base.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "SSE connect to {url} returned {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buf = String::new();

        // The very first event must be `endpoint`.
        let endpoint = tokio::time::timeout(ENDPOINT_TIMEOUT, async {
            loop {
                let chunk = match stream.next().await {
                    Some(Ok(c)) => c,
                    Some(Err(e)) => return Err(TransportError::Http(e.to_string())),
                    None => return Err(TransportError::ConnectionClosed),
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                if let Some(ev) = drain_events(&mut buf)
                    .into_iter()
                    .find(|ev| ev.event == "endpoint")
                {
                    return Ok(ev.data);
                }
            }
        })
        .await
        .map_err(|_| TransportError::Timeout)??;

        let post_url = resolve_endpoint(&base, &endpoint)?;
        tracing::debug!(url, post_url = %post_url, "MCP SSE session established");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader = {
            let pending = Arc::clone(&pending);
            let alive = Arc::clone(&alive);
            tokio::spawn(async move {
                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::debug!(error = %e, "SSE stream error");
                            break;
                        }
                    };
                    buf.push_str(&String::from_utf8_lossy(&chunk));
                    for event in drain_events(&mut buf) {
                        if event.event != "message" {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                            Ok(resp) => {
                                let waiter = pending.lock().remove(&resp.id);
                                match waiter {
                                    Some(tx) => {
                                        let _ = tx.send(resp);
                                    }
                                    None => tracing::debug!(
                                        id = resp.id,
                                        "response with no pending request"
                                    ),
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable message event")
                            }
                        }
                    }
                }
                alive.store(false, Ordering::SeqCst);
                // Dropping the senders wakes every pending caller with an error.
                pending.lock().clear();
            })
        };

        Ok(Self {
            http: http.clone(),
            post_url,
            pending,
            next_id: AtomicU64::new(1),
            alive,
            reader: Mutex::new(Some(reader)),
        })
    }

    async fn post(&self, body: &str) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.post_url.clone())
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "POST returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Resolve the announced endpoint against the SSE URL and require a
/// `sessionId` query parameter.
fn resolve_endpoint(base: &reqwest::Url, endpoint: &str) -> Result<reqwest::Url, TransportError> {
    let url = base
        .join(endpoint)
        .map_err(|e| TransportError::Endpoint(e.to_string()))?;
    let has_session = url
        .query_pairs()
        .any(|(k, v)| k == "sessionId" && !v.is_empty());
    if !has_session {
        return Err(TransportError::Endpoint(format!(
            "endpoint missing sessionId: {endpoint}"
        )));
    }
    Ok(url)
}

#[async_trait]
impl McpTransport for SseClientTransport {
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);
        let body = serde_json::to_string(&req)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        tracing::debug!(id, method, "sending MCP request");
        if let Err(e) = self.post(&body).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Reader task dropped our sender: stream ended mid-request.
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        let notif = JsonRpcNotification::new(method);
        let body = serde_json::to_string(&notif)?;
        tracing::debug!(method, "sending MCP notification");
        self.post(&body).await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.pending.lock().clear();
    }
}

impl Drop for SseClientTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
