//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, and any other
//! endpoint that follows the OpenAI chat completions contract. Streaming
//! only: the orchestrator consumes deltas, so there is no non-streaming
//! path.
//!
//! Tool calls arrive fragmented (an `id`+name chunk, then argument
//! fragments, then a finish chunk); this adapter assembles them and
//! emits one [`StreamEvent::ToolCallFinished`] per call with fully
//! parsed arguments.

use serde_json::Value;

use w3_domain::config::LlmConfig;
use w3_domain::error::{Error, Result};
use w3_domain::stream::{BoxStream, FinishReason, StreamEvent, Usage};
use w3_domain::tool::ToolDefinition;

use crate::from_reqwest;
use crate::sse::sse_response_stream;
use crate::traits::{GenerationRequest, LlmProvider};

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            Error::Config(format!("missing LLM API key: set {}", cfg.api_key_env))
        })?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn build_chat_body(req: &GenerationRequest) -> Value {
    let mut body = serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(req.tools.iter().map(tool_to_openai).collect());
    }
    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Assembly state carried across SSE payloads.
#[derive(Default)]
struct StreamState {
    /// Tool calls being assembled, indexed by the wire `index` field.
    calls: Vec<PendingCall>,
    usage: Option<Usage>,
    finish: Option<FinishReason>,
    flushed: bool,
}

struct PendingCall {
    call_id: String,
    tool_name: String,
    arguments: String,
}

impl StreamState {
    /// Emit `ToolCallFinished` for every assembled call, exactly once.
    fn flush_calls(&mut self) -> Vec<Result<StreamEvent>> {
        if self.flushed {
            return Vec::new();
        }
        self.flushed = true;
        self.calls
            .drain(..)
            .map(|call| {
                let arguments: Value = serde_json::from_str(&call.arguments)
                    .unwrap_or(Value::Object(Default::default()));
                Ok(StreamEvent::ToolCallFinished {
                    call_id: call.call_id,
                    tool_name: call.tool_name,
                    arguments,
                })
            })
            .collect()
    }

    fn done(&mut self) -> StreamEvent {
        StreamEvent::Done {
            usage: self.usage.take(),
            finish_reason: self.finish.take().unwrap_or(FinishReason::Stop),
        }
    }
}

fn parse_sse_data(state: &mut StreamState, data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        let mut events = state.flush_calls();
        events.push(Ok(state.done()));
        return events;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(usage) = v.get("usage").and_then(parse_usage) {
        state.usage = Some(usage);
    }

    let choice = match v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    {
        Some(c) => c,
        // Usage-only chunk (stream_options.include_usage).
        None => return Vec::new(),
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|t| t.as_array()) {
        for tc in tc_arr {
            let index = tc.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;

            if let Some(id) = tc.get("id").and_then(|i| i.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("");
                while state.calls.len() <= index {
                    state.calls.push(PendingCall {
                        call_id: String::new(),
                        tool_name: String::new(),
                        arguments: String::new(),
                    });
                }
                state.calls[index].call_id = id.to_string();
                state.calls[index].tool_name = name.to_string();
                events.push(Ok(StreamEvent::ToolCallStarted {
                    call_id: id.to_string(),
                    tool_name: name.to_string(),
                }));
            }

            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|a| a.as_str())
            {
                if let Some(call) = state.calls.get_mut(index) {
                    call.arguments.push_str(args);
                    if !args.is_empty() {
                        events.push(Ok(StreamEvent::ToolCallDelta {
                            call_id: call.call_id.clone(),
                            delta: args.to_string(),
                        }));
                    }
                }
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    // Arguments are complete once the finish chunk arrives; the terminal
    // Done waits for [DONE] so a trailing usage chunk can be folded in.
    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        state.finish = Some(FinishReason::parse(fr));
        events.extend(state.flush_calls());
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat_stream(
        &self,
        req: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_chat_body(req);

        tracing::debug!(
            provider = %self.id,
            model = %req.model,
            tool_count = req.tools.len(),
            "chat stream request"
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::default();
        Ok(sse_response_stream(resp, move |data| {
            parse_sse_data(&mut state, data)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use w3_domain::tool::Message;

    fn parse_all(state: &mut StreamState, payloads: &[&str]) -> Vec<StreamEvent> {
        payloads
            .iter()
            .flat_map(|p| parse_sse_data(state, p))
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn body_includes_model_messages_and_stream_options() {
        let req = GenerationRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        let body = build_chat_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn body_maps_tools_and_temperature() {
        let mut req = GenerationRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        req.temperature = Some(0.1);
        req.tools.push(ToolDefinition {
            name: "token_security".into(),
            description: "Scan a token".into(),
            parameters: json!({ "type": "object" }),
        });
        let body = build_chat_body(&req);
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "token_security");
    }

    #[test]
    fn text_deltas_become_tokens() {
        let mut state = StreamState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
                r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        );
        assert!(matches!(&events[0], StreamEvent::Token { text } if text == "Hel"));
        assert!(matches!(&events[1], StreamEvent::Token { text } if text == "lo"));
        assert!(matches!(
            &events[2],
            StreamEvent::Done {
                finish_reason: FinishReason::Stop,
                ..
            }
        ));
    }

    #[test]
    fn tool_call_is_assembled_across_chunks() {
        let mut state = StreamState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"echo","arguments":""}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"text\":"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"ping\"}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );

        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallStarted { call_id, tool_name }
                if call_id == "call_1" && tool_name == "echo"
        ));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta { .. }));

        let finished = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => Some((call_id.clone(), tool_name.clone(), arguments.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(finished.0, "call_1");
        assert_eq!(finished.1, "echo");
        assert_eq!(finished.2, json!({ "text": "ping" }));

        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Done {
                finish_reason: FinishReason::ToolCalls,
                ..
            }
        ));
    }

    #[test]
    fn parallel_tool_calls_tracked_by_index() {
        let mut state = StreamState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c0","function":{"name":"a","arguments":"{}"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"c1","function":{"name":"b","arguments":"{}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );
        let finished: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallFinished { tool_name, .. } => Some(tool_name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec!["a", "b"]);
    }

    #[test]
    fn trailing_usage_chunk_is_folded_into_done() {
        let mut state = StreamState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"content":"ok"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
                "[DONE]",
            ],
        );
        match events.last().unwrap() {
            StreamEvent::Done { usage, .. } => {
                assert_eq!(usage.as_ref().unwrap().total_tokens, 15)
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let mut state = StreamState::default();
        let events = parse_sse_data(&mut state, "{not json");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[test]
    fn unparseable_arguments_default_to_empty_object() {
        let mut state = StreamState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c0","function":{"name":"t","arguments":"{broken"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            ],
        );
        let args = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolCallFinished { arguments, .. } => Some(arguments.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(args, json!({}));
    }
}
