//! Minimal SSE wire parsing and framing.
//!
//! Only the subset of the SSE format the MCP transport uses: named events
//! with a single `data:` payload, delimited by a blank line. Comments
//! (`: keepalive`) and unknown fields are skipped.

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// The `event:` field; defaults to `message` per the SSE standard.
    pub event: String,
    /// Concatenated `data:` lines, joined with newlines.
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Render to wire format, ready to write to the response body.
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

/// Drain every complete event out of `buf`, leaving any trailing
/// partial event in place for the next chunk.
pub fn drain_events(buf: &mut String) -> Vec<SseEvent> {
    let mut events = Vec::new();

    while let Some(pos) = find_delimiter(buf) {
        let (raw, rest_start) = {
            let raw = buf[..pos].to_string();
            // Skip past the blank-line delimiter (either \n\n or \r\n\r\n).
            let delim_len = if buf[pos..].starts_with("\r\n\r\n") { 4 } else { 2 };
            (raw, pos + delim_len)
        };
        buf.drain(..rest_start);

        if let Some(event) = parse_event(&raw) {
            events.push(event);
        }
    }

    events
}

fn find_delimiter(buf: &str) -> Option<usize> {
    let lf = buf.find("\n\n");
    let crlf = buf.find("\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim_start().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() && event == "message" {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
