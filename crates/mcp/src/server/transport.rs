//! Server-side SSE session transport.
//!
//! One [`SessionTransport`] backs one SSE connection. Outbound frames go
//! to the HTTP layer through the receiver returned by [`SessionTransport::start`];
//! inbound POSTs arrive through [`SessionTransport::handle_incoming`] and are
//! surfaced on the [`TransportEvent`] channel for the serve loop to consume.
//!
//! Lifecycle is strictly `Idle -> Started -> Closed`; no state is ever
//! re-entered.

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;
use crate::sse::SseEvent;

/// What the serve loop observes from a session.
#[derive(Debug)]
pub enum TransportEvent {
    /// A well-formed JSON-RPC message arrived via POST.
    Message(Value),
    /// The session transitioned to `Closed`. Emitted exactly once.
    Closed,
    /// A non-fatal transport fault (e.g. an unparseable POST body).
    Error(TransportError),
}

/// Outcome of handling one inbound POST: an HTTP status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct PostOutcome {
    pub status: u16,
    pub body: Value,
}

impl PostOutcome {
    fn accepted() -> Self {
        Self {
            status: 202,
            body: serde_json::json!({ "status": "accepted" }),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self {
            status: 400,
            body: serde_json::json!({ "error": message }),
        }
    }

    fn not_connected() -> Self {
        Self {
            status: 500,
            body: serde_json::json!({ "error": "transport not connected" }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Started,
    Closed,
}

/// A single MCP session over SSE + POST.
pub struct SessionTransport {
    session_id: String,
    endpoint: String,
    state: Mutex<State>,
    sink: Mutex<Option<mpsc::UnboundedSender<SseEvent>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl SessionTransport {
    /// Create a transport for the given POST endpoint path.
    ///
    /// The returned receiver carries the session's [`TransportEvent`]s;
    /// the serve loop owns it.
    pub fn new(endpoint: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            session_id: Uuid::new_v4().to_string(),
            endpoint: endpoint.into(),
            state: Mutex::new(State::Idle),
            sink: Mutex::new(None),
            events: events_tx,
        };
        (transport, events_rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin the session. The returned receiver yields outbound SSE
    /// frames, with the mandatory `endpoint` event already queued first.
    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<SseEvent>, TransportError> {
        let mut state = self.state.lock();
        if *state != State::Idle {
            return Err(TransportError::AlreadyStarted);
        }
        *state = State::Started;
        drop(state);

        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint_frame = SseEvent::new(
            "endpoint",
            format!("{}?sessionId={}", self.endpoint, self.session_id),
        );
        // Receiver was just created; this cannot fail.
        let _ = tx.send(endpoint_frame);
        *self.sink.lock() = Some(tx);
        Ok(rx)
    }

    /// Queue one JSON-RPC message as an SSE `message` event.
    ///
    /// If the HTTP side dropped the frame receiver (client went away),
    /// the session closes and `Closed` is emitted.
    pub fn send(&self, message: &Value) -> Result<(), TransportError> {
        if *self.state.lock() != State::Started {
            return Err(TransportError::NotConnected);
        }
        let tx = match self.sink.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(TransportError::NotConnected),
        };
        let frame = SseEvent::new("message", serde_json::to_string(message)?);
        if tx.send(frame).is_err() {
            tracing::debug!(session_id = %self.session_id, "frame receiver dropped, closing session");
            self.close();
            return Err(TransportError::ConnectionClosed);
        }
        Ok(())
    }

    /// Future that resolves once the HTTP side drops the frame receiver.
    /// `None` before `start` or after `close`.
    pub fn sink_closed(&self) -> Option<impl std::future::Future<Output = ()> + Send + 'static> {
        self.sink
            .lock()
            .as_ref()
            .cloned()
            .map(|tx| async move { tx.closed().await })
    }

    /// Validate and route one inbound POST body.
    ///
    /// Accepted messages are forwarded on the event channel and answered
    /// with 202 before the serve loop processes them.
    pub fn handle_incoming(&self, content_type: Option<&str>, body: &str) -> PostOutcome {
        if *self.state.lock() != State::Started {
            return PostOutcome::not_connected();
        }

        let is_json = content_type
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return PostOutcome::bad_request("unsupported content-type, expected application/json");
        }

        let parsed: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                let _ = self
                    .events
                    .send(TransportEvent::Error(TransportError::InvalidMessage(
                        e.to_string(),
                    )));
                return PostOutcome::bad_request("invalid JSON body");
            }
        };
        if !parsed.is_object() {
            let _ = self
                .events
                .send(TransportEvent::Error(TransportError::InvalidMessage(
                    "expected a JSON object".into(),
                )));
            return PostOutcome::bad_request("expected a JSON-RPC object");
        }

        let _ = self.events.send(TransportEvent::Message(parsed));
        PostOutcome::accepted()
    }

    /// Close the session. Safe to call any number of times; `Closed` is
    /// emitted only on the `Started -> Closed` transition.
    pub fn close(&self) {
        let mut state = self.state.lock();
        let was_started = *state == State::Started;
        *state = State::Closed;
        drop(state);

        *self.sink.lock() = None;
        if was_started {
            let _ = self.events.send(TransportEvent::Closed);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == State::Closed
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> (
        SessionTransport,
        mpsc::UnboundedReceiver<TransportEvent>,
        mpsc::UnboundedReceiver<SseEvent>,
    ) {
        let (transport, events) = SessionTransport::new("/mcp/sse/goplus");
        let frames = transport.start().unwrap();
        (transport, events, frames)
    }

    #[tokio::test]
    async fn first_frame_is_endpoint_event_with_session_id() {
        let (transport, _events, mut frames) = started();
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.event, "endpoint");
        assert_eq!(
            frame.data,
            format!("/mcp/sse/goplus?sessionId={}", transport.session_id())
        );
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (transport, _events, _frames) = started();
        assert!(matches!(
            transport.start(),
            Err(TransportError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn start_after_close_is_rejected() {
        let (transport, _events) = SessionTransport::new("/mcp/sse/goplus");
        let _frames = transport.start().unwrap();
        transport.close();
        assert!(matches!(
            transport.start(),
            Err(TransportError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn send_before_start_is_not_connected() {
        let (transport, _events) = SessionTransport::new("/mcp/sse/goplus");
        let err = transport.send(&serde_json::json!({"jsonrpc": "2.0"}));
        assert!(matches!(err, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn send_queues_message_frame() {
        let (transport, _events, mut frames) = started();
        frames.recv().await.unwrap(); // endpoint frame

        let msg = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": {} });
        transport.send(&msg).unwrap();

        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.event, "message");
        let round: Value = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(round, msg);
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_closes_session() {
        let (transport, mut events, frames) = started();
        drop(frames);

        let err = transport.send(&serde_json::json!({"jsonrpc": "2.0"}));
        assert!(matches!(err, Err(TransportError::ConnectionClosed)));
        assert!(transport.is_closed());
        assert!(matches!(events.recv().await, Some(TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn incoming_before_start_is_500() {
        let (transport, _events) = SessionTransport::new("/mcp/sse/goplus");
        let out = transport.handle_incoming(Some("application/json"), "{}");
        assert_eq!(out.status, 500);
    }

    #[tokio::test]
    async fn incoming_after_close_is_500() {
        let (transport, _events, _frames) = started();
        transport.close();
        let out = transport.handle_incoming(Some("application/json"), "{}");
        assert_eq!(out.status, 500);
    }

    #[tokio::test]
    async fn incoming_rejects_wrong_content_type() {
        let (transport, _events, _frames) = started();
        let out = transport.handle_incoming(Some("text/plain"), "{}");
        assert_eq!(out.status, 400);
        let out = transport.handle_incoming(None, "{}");
        assert_eq!(out.status, 400);
    }

    #[tokio::test]
    async fn incoming_rejects_invalid_json_and_reports_error() {
        let (transport, mut events, _frames) = started();
        let out = transport.handle_incoming(Some("application/json"), "{not json");
        assert_eq!(out.status, 400);
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Error(TransportError::InvalidMessage(_)))
        ));
    }

    #[tokio::test]
    async fn incoming_rejects_non_object_payload() {
        let (transport, mut events, _frames) = started();
        for body in ["[1,2,3]", "\"hello\"", "42", "null"] {
            let out = transport.handle_incoming(Some("application/json"), body);
            assert_eq!(out.status, 400, "body {body} should be rejected");
            assert!(matches!(
                events.recv().await,
                Some(TransportEvent::Error(TransportError::InvalidMessage(_)))
            ));
        }
    }

    #[tokio::test]
    async fn incoming_accepts_object_with_202() {
        let (transport, mut events, _frames) = started();
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let out = transport.handle_incoming(Some("application/json; charset=utf-8"), body);
        assert_eq!(out.status, 202);
        assert_eq!(out.body["status"], "accepted");

        match events.recv().await {
            Some(TransportEvent::Message(v)) => assert_eq!(v["method"], "tools/list"),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_emits_closed_once() {
        let (transport, mut events, _frames) = started();
        transport.close();
        transport.close();
        transport.close();

        assert!(matches!(events.recv().await, Some(TransportEvent::Closed)));
        // Channel drained; sender is still alive inside the transport, so
        // use try_recv to assert no second Closed was queued.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_before_start_emits_nothing() {
        let (transport, mut events) = SessionTransport::new("/mcp/sse/goplus");
        transport.close();
        assert!(events.try_recv().is_err());
        assert!(transport.is_closed());
    }
}
