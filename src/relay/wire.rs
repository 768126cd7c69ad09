//! Wire events and their SSE text framing.
//!
//! Every event is one `data: <json>\n\n` frame. The stream always closes
//! with the fixed [`END_FRAME`]. [`FrameDecoder`] is the inverse and is
//! what clients use to read a stream back.

use serde::{Deserialize, Serialize};

/// Terminal frame of every stream.
pub const END_FRAME: &str = "event: end\ndata: \n\n";

/// The closed set of events a caller can observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Token {
        content: String,
    },
    ToolStart {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    Error {
        content: String,
    },
    End,
}

impl WireEvent {
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Encode one event as an SSE frame.
pub fn encode_frame(event: &WireEvent) -> String {
    if event.is_end() {
        return END_FRAME.to_string();
    }
    // An encode failure goes out as an error frame so the stream stays well formed.
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "content": e.to_string() }).to_string()
    });
    format!("data: {json}\n\n")
}

/// Legacy error payload without a `type` field.
#[derive(Deserialize)]
struct BareError {
    error: String,
}

/// Incremental SSE frame decoder.
///
/// Feed it arbitrary chunks; it returns the events completed so far.
/// Undecodable frames are skipped. After the end frame (or an `end`
/// payload) it is finished and ignores further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<WireEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.push_str(chunk);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = decode_frame(&frame) {
                let done = event.is_end();
                events.push(event);
                if done {
                    self.finished = true;
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }
}

fn decode_frame(frame: &str) -> Option<WireEvent> {
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            if name.trim() == "end" {
                return Some(WireEvent::End);
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    let payload = data.join("\n");
    if payload.trim().is_empty() {
        return None;
    }
    serde_json::from_str::<WireEvent>(&payload)
        .ok()
        .or_else(|| {
            serde_json::from_str::<BareError>(&payload)
                .ok()
                .map(|e| WireEvent::error(e.error))
        })
}
