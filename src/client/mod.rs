//! HTTP client for a running relay.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::relay::{ChatMessage, FrameDecoder, WireEvent};
use crate::util::text::take_utf8;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StreamBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
    stream_tokens: bool,
}

/// Talks to the invoke and stream routes of one relay.
#[derive(Debug, Clone)]
pub struct AgentClient {
    base_url: String,
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the agents the server has loaded.
    pub async fn agents(&self) -> Result<Vec<String>> {
        let resp = self.http.get(format!("{}/health", self.base_url)).send().await?;
        let body: Value = check(resp).await?.json().await?;
        Ok(body["agents"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Run one turn and wait for the final answer.
    pub async fn invoke(&self, agent: &str, message: &str, thread_id: Option<&str>) -> Result<ChatMessage> {
        let resp = self
            .http
            .post(format!("{}/{agent}/invoke", self.base_url))
            .json(&InvokeBody { message, thread_id })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Run one turn as a stream of wire events, ending after `end`.
    ///
    /// A connection that closes without an end frame ends the stream
    /// with `end`.
    pub async fn stream(
        &self,
        agent: &str,
        message: &str,
        thread_id: Option<&str>,
        stream_tokens: bool,
    ) -> Result<BoxStream<'static, WireEvent>> {
        let resp = self
            .http
            .post(format!("{}/{agent}/stream", self.base_url))
            .json(&StreamBody {
                message,
                thread_id,
                stream_tokens,
            })
            .send()
            .await?;
        let mut body = check(resp).await?.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut decoder = FrameDecoder::new();
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield WireEvent::error(format!("Stream interrupted: {e}"));
                        yield WireEvent::End;
                        return;
                    }
                };
                pending.extend_from_slice(&chunk);
                let text = take_utf8(&mut pending);
                for event in decoder.feed(&text) {
                    yield event;
                }
                if decoder.is_finished() {
                    return;
                }
            }
            debug!("stream closed without an end frame");
            yield WireEvent::End;
        }))
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(match status.as_u16() {
        404 => RelayError::AgentNotFound(message),
        422 => RelayError::InvalidArgument(message),
        code => RelayError::api(code, message),
    })
}
