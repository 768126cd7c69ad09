//! SSE response plumbing.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::relay::{encode_frame, WireEvent};

/// Wrap a byte stream in a `text/event-stream` response.
pub fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}

/// Encode wire events into SSE frames.
pub fn frames(events: BoxStream<'static, WireEvent>) -> impl Stream<Item = Result<Bytes, Infallible>> {
    events.map(|event| Ok(Bytes::from(encode_frame(&event))))
}
