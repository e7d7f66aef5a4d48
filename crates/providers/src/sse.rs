//! SSE plumbing shared by provider adapters.
//!
//! The chat completions stream is a sequence of `data:` payloads
//! delimited by blank lines. [`drain_data_lines`] pulls complete
//! payloads out of a chunk buffer; [`sse_response_stream`] turns a
//! `reqwest::Response` plus a payload parser into a [`BoxStream`] of
//! events, guaranteeing a terminal `Done`.

use w3_domain::error::Result;
use w3_domain::stream::{BoxStream, FinishReason, StreamEvent};

use crate::from_reqwest;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// The buffer is drained in place; a trailing partial event stays put
/// for the next chunk. `event:`, `id:` and `retry:` lines are ignored.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
    }

    payloads
}

/// Build an event stream from an SSE response and a payload parser.
///
/// The parser is `FnMut` because adapters keep assembly state across
/// payloads (partial tool-call arguments). The stream:
/// 1. buffers chunks and feeds complete payloads to the parser,
/// 2. flushes any trailing partial payload when the body closes,
/// 3. emits a fallback `Done` if the parser never produced one.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            done_emitted |= matches!(&event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                done_emitted |= matches!(&event, Ok(StreamEvent::Done { .. }));
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: FinishReason::Stop,
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
