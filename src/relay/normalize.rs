//! Raw agent events to wire events.

use std::panic::AssertUnwindSafe;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::error;

use super::wire::WireEvent;
use crate::agent::{RawEvent, RawEventStream};

/// Map one raw event to its wire form, if it has one.
///
/// Tool starts always pass. Model tokens pass unless tagged internal,
/// empty after flattening, or suppressed by `stream_tokens = false`.
pub fn normalize_event(event: RawEvent, stream_tokens: bool) -> Option<WireEvent> {
    match event {
        RawEvent::ToolStart { name, input, .. } => Some(WireEvent::ToolStart { name, input }),
        ref internal if internal.is_internal() => None,
        RawEvent::ChatModelStream { chunk, .. } if stream_tokens => {
            let content = chunk.flatten();
            (!content.is_empty()).then(|| WireEvent::token(content))
        }
        _ => None,
    }
}

/// Turn a raw event stream into wire events.
///
/// Never fails: an error or a panic inside the agent stream becomes one
/// `error` event, and every stream ends with exactly one `end`.
pub fn normalize(raw: RawEventStream, stream_tokens: bool) -> BoxStream<'static, WireEvent> {
    Box::pin(async_stream::stream! {
        let mut raw = AssertUnwindSafe(raw).catch_unwind();
        while let Some(item) = raw.next().await {
            match item {
                Ok(Ok(event)) => {
                    if let Some(wire) = normalize_event(event, stream_tokens) {
                        yield wire;
                    }
                }
                Ok(Err(e)) => {
                    error!(error = %e, category = ?e.category(), "agent stream failed");
                    yield WireEvent::error(e.to_string());
                    break;
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(panic = %message, "agent stream panicked");
                    yield WireEvent::error(format!("Agent panicked: {message}"));
                    break;
                }
            }
        }
        yield WireEvent::End;
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
