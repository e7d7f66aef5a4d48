//! One chat turn, streamed as NDJSON frames.
//!
//! The primary pass streams the tool-calling model, executing each tool
//! call inline as its arguments complete. If the model stopped *because*
//! of tool calls and at least one call finished with a result, a second
//! analysis pass narrates the raw tool output on the same stream.
//!
//! The MCP client pool is torn down exactly once on every exit path:
//! normal finish, analysis finish, any failure, and a client that
//! disconnects mid-stream (handled by [`PoolGuard`]'s drop).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};

use w3_domain::config::LlmConfig;
use w3_domain::stream::{BoxStream, FinishReason, StreamEvent};
use w3_domain::tool::{Message, Role};
use w3_mcp::client::ToolClientPool;
use w3_providers::traits::{GenerationRequest, LlmProvider};

use crate::runtime::analysis;

const PRIMARY_SYSTEM_PROMPT: &str = "You are a professional Web3 assistant, fluent in blockchain, \
     DeFi, NFTs, and cryptocurrency. When you fetch data through tools, explain the results in \
     detail and give the user thorough analysis and insight. Keep answers professional yet easy \
     to understand.";

const PRIMARY_TEMPERATURE: f32 = 0.0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One NDJSON frame on the chat response stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A chunk of assistant text, from either pass.
    Token { text: String },
    /// The model requested a tool call, arguments fully assembled.
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    /// A tool call finished executing.
    ToolResult {
        call_id: String,
        tool_name: String,
        result: String,
    },
    /// A new pass is starting on the same stream.
    Phase { name: String },
    /// Something went wrong; a `done` frame still follows.
    Error { message: String },
    /// Terminal frame, always the last one of a turn.
    Done,
}

impl TurnEvent {
    fn frame(&self) -> Bytes {
        let mut line =
            serde_json::to_vec(self).unwrap_or_else(|_| br#"{"type":"error"}"#.to_vec());
        line.push(b'\n');
        Bytes::from(line)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool record log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool call and (once executed) its result, in the shape the
/// analysis pass serializes for the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRecord {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(rename = "toolInput")]
    pub tool_input: Value,
    #[serde(rename = "toolResult")]
    pub tool_result: Option<String>,
}

/// Pairs tool calls with their results in FIFO order: a result attaches
/// to the oldest call still missing one.
#[derive(Debug, Default)]
pub struct ToolRecordLog {
    records: Vec<ToolRecord>,
}

impl ToolRecordLog {
    pub fn record_call(&mut self, tool_name: &str, input: Value) {
        self.records.push(ToolRecord {
            tool_name: tool_name.to_string(),
            tool_input: input,
            tool_result: None,
        });
    }

    pub fn record_result(&mut self, result: String) {
        match self.records.iter_mut().find(|r| r.tool_result.is_none()) {
            Some(record) => record.tool_result = Some(result),
            None => tracing::warn!("tool result with no pending call, dropping"),
        }
    }

    /// Records that have both a call and a result.
    pub fn completed(&self) -> Vec<ToolRecord> {
        self.records
            .iter()
            .filter(|r| r.tool_result.is_some())
            .cloned()
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pool teardown guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the MCP client pool for the duration of a turn and tears it
/// down exactly once. The normal paths call [`PoolGuard::release`]
/// before the terminal frame; if the response stream is dropped
/// mid-turn, the drop impl spawns the teardown instead.
struct PoolGuard {
    pool: Option<ToolClientPool>,
}

impl PoolGuard {
    fn new(pool: ToolClientPool) -> Self {
        Self { pool: Some(pool) }
    }

    async fn release(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close_all().await;
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    tracing::debug!("turn stream dropped, closing MCP clients in background");
                    handle.spawn(async move { pool.close_all().await });
                }
                Err(_) => {
                    tracing::warn!("no runtime at drop, MCP clients not closed");
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn orchestration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The conversation a turn works on.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub messages: Vec<Message>,
    pub wallet_address: Option<String>,
}

/// Build the primary-pass message list: system prompt first, then the
/// conversation. The wallet address is appended to the latest user
/// message only, so the model can pass it to wallet-scoped tools
/// without it piling up across the whole history.
fn primary_messages(ctx: &TurnContext) -> Vec<Message> {
    let mut out = Vec::with_capacity(ctx.messages.len() + 1);
    out.push(Message::system(PRIMARY_SYSTEM_PROMPT));
    out.extend(ctx.messages.iter().cloned());
    if let Some(wallet) = &ctx.wallet_address {
        if let Some(last_user) = out.iter_mut().rev().find(|m| m.role == Role::User) {
            last_user.content = format!("{}\n\nMy wallet address: {wallet}", last_user.content);
        }
    }
    out
}

/// Run one turn and stream its NDJSON frames.
///
/// The deadline covers the whole turn, tool execution included. The
/// final frame is always [`TurnEvent::Done`].
pub fn run_turn(
    provider: Arc<dyn LlmProvider>,
    llm: LlmConfig,
    deadline: Duration,
    ctx: TurnContext,
    pool: ToolClientPool,
) -> BoxStream<'static, Bytes> {
    let stream = async_stream::stream! {
        let deadline = Instant::now() + deadline;
        let tools = pool.merged_tools();
        let mut guard = PoolGuard::new(pool);
        let mut log = ToolRecordLog::default();

        let request = GenerationRequest {
            messages: primary_messages(&ctx),
            tools: tools.definitions(),
            temperature: Some(PRIMARY_TEMPERATURE),
            model: llm.model.clone(),
        };

        let mut finish = FinishReason::Stop;
        let mut failed = false;

        match provider.chat_stream(&request).await {
            Ok(mut events) => loop {
                let event = match timeout_at(deadline, events.next()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => {
                        yield TurnEvent::Error { message: "turn deadline exceeded".into() }.frame();
                        failed = true;
                        break;
                    }
                };
                match event {
                    Ok(StreamEvent::Token { text }) => {
                        yield TurnEvent::Token { text }.frame();
                    }
                    Ok(StreamEvent::ToolCallFinished { call_id, tool_name, arguments }) => {
                        tracing::info!(tool = %tool_name, "executing tool call");
                        log.record_call(&tool_name, arguments.clone());
                        yield TurnEvent::ToolCall {
                            call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                            arguments: arguments.clone(),
                        }
                        .frame();

                        // Tool execution counts against the same deadline.
                        let result = match timeout_at(deadline, tools.call(&tool_name, arguments)).await {
                            Ok(result) => result,
                            Err(_) => {
                                yield TurnEvent::Error { message: "turn deadline exceeded".into() }.frame();
                                failed = true;
                                break;
                            }
                        };
                        log.record_result(result.clone());
                        yield TurnEvent::ToolResult { call_id, tool_name, result }.frame();
                    }
                    Ok(StreamEvent::ToolCallStarted { .. })
                    | Ok(StreamEvent::ToolCallDelta { .. }) => {}
                    Ok(StreamEvent::Done { finish_reason, .. }) => {
                        finish = finish_reason;
                        break;
                    }
                    Ok(StreamEvent::Error { message }) => {
                        tracing::warn!(%message, "provider reported stream error");
                        yield TurnEvent::Error { message }.frame();
                        failed = true;
                        break;
                    }
                    Err(e) => {
                        yield TurnEvent::Error { message: e.to_string() }.frame();
                        failed = true;
                        break;
                    }
                }
            },
            Err(e) => {
                yield TurnEvent::Error { message: format!("chat request failed: {e}") }.frame();
                failed = true;
            }
        }

        // The analysis pass only runs when the model stopped *for* tools
        // and at least one call actually produced a result.
        let records = log.completed();
        if !failed && finish == FinishReason::ToolCalls && !records.is_empty() {
            yield TurnEvent::Phase { name: "analysis".into() }.frame();
            let request = analysis::analysis_request(&llm, &records);
            match provider.chat_stream(&request).await {
                Ok(mut events) => loop {
                    match timeout_at(deadline, events.next()).await {
                        Ok(Some(Ok(StreamEvent::Token { text }))) => {
                            yield TurnEvent::Token { text }.frame();
                        }
                        Ok(Some(Ok(StreamEvent::Done { .. }))) | Ok(None) => break,
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(e))) => {
                            yield TurnEvent::Error { message: e.to_string() }.frame();
                            break;
                        }
                        Err(_) => {
                            yield TurnEvent::Error { message: "turn deadline exceeded".into() }.frame();
                            break;
                        }
                    }
                },
                Err(e) => {
                    yield TurnEvent::Error { message: format!("analysis request failed: {e}") }.frame();
                }
            }
        }

        guard.release().await;
        yield TurnEvent::Done.frame();
    };
    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use w3_domain::error::{Error, Result};
    use w3_mcp::client::{McpClient, McpTransport};
    use w3_mcp::protocol::{initialize_result, JsonRpcResponse};
    use w3_mcp::TransportError;

    // ── Scripted LLM provider ───────────────────────────────────────

    enum Script {
        Events(Vec<Result<StreamEvent>>),
        Hang,
    }

    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat_stream(
            &self,
            req: &GenerationRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            self.requests.lock().push(req.clone());
            match self.scripts.lock().pop_front() {
                Some(Script::Events(events)) => Ok(Box::pin(futures_util::stream::iter(events))),
                Some(Script::Hang) => Ok(Box::pin(futures_util::stream::pending())),
                None => Err(Error::Other("provider unavailable".into())),
            }
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    fn token(text: &str) -> Result<StreamEvent> {
        Ok(StreamEvent::Token { text: text.into() })
    }

    fn tool_call(id: &str, name: &str) -> Result<StreamEvent> {
        Ok(StreamEvent::ToolCallFinished {
            call_id: id.into(),
            tool_name: name.into(),
            arguments: json!({}),
        })
    }

    fn done(reason: FinishReason) -> Result<StreamEvent> {
        Ok(StreamEvent::Done {
            usage: None,
            finish_reason: reason,
        })
    }

    // ── Counting MCP transport ──────────────────────────────────────

    /// Answers the handshake with one `ping` tool (result `pong`) and
    /// counts every shutdown call.
    struct CountingTransport {
        shutdowns: Arc<AtomicUsize>,
        alive: AtomicBool,
    }

    #[async_trait]
    impl McpTransport for CountingTransport {
        async fn send_request(
            &self,
            method: &str,
            _params: Option<Value>,
        ) -> std::result::Result<JsonRpcResponse, TransportError> {
            let result = match method {
                "initialize" => initialize_result("test-mcp-server", "0.0.0"),
                "tools/list" => json!({
                    "tools": [{
                        "name": "ping",
                        "description": "Reply with pong",
                        "inputSchema": { "type": "object", "properties": {} }
                    }]
                }),
                "tools/call" => json!({
                    "content": [{ "type": "text", "text": "pong" }]
                }),
                _ => json!({}),
            };
            Ok(JsonRpcResponse::ok(1, result))
        }

        async fn send_notification(
            &self,
            _method: &str,
        ) -> std::result::Result<(), TransportError> {
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn shutdown(&self) {
            self.alive.store(false, Ordering::SeqCst);
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn counting_pool(shutdowns: &Arc<AtomicUsize>) -> ToolClientPool {
        let transport = CountingTransport {
            shutdowns: Arc::clone(shutdowns),
            alive: AtomicBool::new(true),
        };
        let client = McpClient::initialize("test".into(), Box::new(transport))
            .await
            .unwrap();
        ToolClientPool::from_clients(vec![client])
    }

    fn ctx(text: &str) -> TurnContext {
        TurnContext {
            messages: vec![Message::user(text)],
            wallet_address: None,
        }
    }

    async fn collect(stream: BoxStream<'static, Bytes>) -> Vec<Value> {
        stream
            .map(|frame| serde_json::from_slice(&frame).unwrap())
            .collect()
            .await
    }

    fn types(frames: &[Value]) -> Vec<&str> {
        frames
            .iter()
            .map(|f| f["type"].as_str().unwrap())
            .collect()
    }

    // ── Record log ──────────────────────────────────────────────────

    #[test]
    fn results_pair_with_oldest_pending_call() {
        let mut log = ToolRecordLog::default();
        log.record_call("scan", json!({"a": 1}));
        log.record_call("swap", json!({"b": 2}));
        log.record_result("scan result".into());
        log.record_result("swap result".into());

        let records = log.completed();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tool_name, "scan");
        assert_eq!(records[0].tool_result.as_deref(), Some("scan result"));
        assert_eq!(records[1].tool_name, "swap");
        assert_eq!(records[1].tool_result.as_deref(), Some("swap result"));
    }

    #[test]
    fn completed_skips_calls_without_results() {
        let mut log = ToolRecordLog::default();
        log.record_call("scan", json!({}));
        log.record_call("swap", json!({}));
        log.record_result("only one".into());

        let records = log.completed();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_name, "scan");
    }

    #[test]
    fn orphan_result_is_dropped() {
        let mut log = ToolRecordLog::default();
        log.record_result("nobody asked".into());
        assert!(log.completed().is_empty());
    }

    // ── Message preparation ─────────────────────────────────────────

    #[test]
    fn wallet_is_appended_to_latest_user_message_only() {
        let ctx = TurnContext {
            messages: vec![
                Message::user("what do I hold?"),
                Message::assistant("let me look"),
                Message::user("and my pnl?"),
            ],
            wallet_address: Some("0xabc".into()),
        };
        let messages = primary_messages(&ctx);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "what do I hold?");
        assert_eq!(messages[2].content, "let me look");
        assert!(messages[3].content.ends_with("My wallet address: 0xabc"));
    }

    #[test]
    fn no_wallet_leaves_messages_untouched() {
        let messages = primary_messages(&ctx("hello"));
        assert_eq!(messages[1].content, "hello");
    }

    // ── Full turn scenarios ─────────────────────────────────────────

    #[tokio::test]
    async fn plain_answer_closes_pool_once() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![Script::Events(vec![
            token("hello"),
            token(" there"),
            done(FinishReason::Stop),
        ])]);

        let frames = collect(run_turn(
            provider.clone(),
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(types(&frames), vec!["token", "token", "done"]);
        assert_eq!(frames[0]["text"], "hello");
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        // No analysis pass for a plain answer.
        assert_eq!(provider.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn tool_turn_runs_analysis_and_closes_once() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![
            Script::Events(vec![
                token("checking"),
                tool_call("call_1", "ping"),
                done(FinishReason::ToolCalls),
            ]),
            Script::Events(vec![token("pong looks healthy"), done(FinishReason::Stop)]),
        ]);

        let frames = collect(run_turn(
            provider.clone(),
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("ping the server"),
            pool,
        ))
        .await;

        assert_eq!(
            types(&frames),
            vec!["token", "tool_call", "tool_result", "phase", "token", "done"]
        );
        assert_eq!(frames[1]["tool_name"], "ping");
        assert_eq!(frames[2]["result"], "pong");
        assert_eq!(frames[3]["name"], "analysis");
        assert_eq!(frames[4]["text"], "pong looks healthy");
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        // The second request is the analysis pass: no tools, low
        // temperature, tool records serialized into the prompt.
        let requests = provider.requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].temperature == Some(0.0));
        assert!(!requests[0].tools.is_empty());
        assert!(requests[1].tools.is_empty());
        assert_eq!(requests[1].temperature, Some(0.1));
        let prompt = &requests[1].messages[1].content;
        assert!(prompt.contains("\"toolName\": \"ping\""), "got: {prompt}");
        assert!(prompt.contains("pong"));
    }

    #[tokio::test]
    async fn tool_finish_without_tool_records_skips_analysis() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider =
            ScriptedProvider::new(vec![Script::Events(vec![done(FinishReason::ToolCalls)])]);

        let frames = collect(run_turn(
            provider.clone(),
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(types(&frames), vec!["done"]);
        assert_eq!(provider.requests.lock().len(), 1);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_failure_still_closes_pool() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![]);

        let frames = collect(run_turn(
            provider,
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(types(&frames), vec!["error", "done"]);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mid_stream_error_skips_analysis_and_closes_pool() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![Script::Events(vec![
            token("partial"),
            tool_call("call_1", "ping"),
            Err(Error::Http("upstream reset".into())),
        ])]);

        let frames = collect(run_turn(
            provider.clone(),
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(
            types(&frames),
            vec!["token", "tool_call", "tool_result", "error", "done"]
        );
        // Even with a completed tool record, a failed primary pass
        // never triggers analysis.
        assert_eq!(provider.requests.lock().len(), 1);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_stream_tears_down_pool() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![Script::Hang]);

        let mut stream = run_turn(
            provider,
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        );
        // Nothing has been yielded yet; poll once to start the turn,
        // then drop mid-stream like a disconnecting client.
        let poll = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(poll.is_err(), "hung provider should not yield");
        drop(stream);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_turn_and_closes_pool() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        let provider = ScriptedProvider::new(vec![Script::Hang]);

        let frames = collect(run_turn(
            provider,
            LlmConfig::default(),
            Duration::from_secs(5),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(types(&frames), vec!["error", "done"]);
        assert_eq!(frames[0]["message"], "turn deadline exceeded");
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn analysis_failure_still_closes_pool() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&shutdowns).await;
        // Primary pass succeeds with a tool call; no script remains for
        // the analysis pass, so it fails to start.
        let provider = ScriptedProvider::new(vec![Script::Events(vec![
            tool_call("call_1", "ping"),
            done(FinishReason::ToolCalls),
        ])]);

        let frames = collect(run_turn(
            provider,
            LlmConfig::default(),
            Duration::from_secs(30),
            ctx("hi"),
            pool,
        ))
        .await;

        assert_eq!(
            types(&frames),
            vec!["tool_call", "tool_result", "phase", "error", "done"]
        );
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }
}
