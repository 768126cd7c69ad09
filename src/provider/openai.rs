//! OpenAI-compatible Chat Completions provider.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::RelayError;
use crate::models::ProviderKey;
use crate::types::*;
use crate::util::text::take_utf8;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

pub struct OpenAiCompatibleProvider {
    provider: ProviderKey,
    provider_name: String,
    model_id: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        provider: ProviderKey,
        model_id: impl Into<String>,
        api_key: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            provider_name: provider.to_string(),
            model_id: model_id.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut obj = serde_json::Map::new();
        obj.insert("model".into(), self.model_id.clone().into());
        obj.insert("messages".into(), messages.into());
        obj.insert("stream".into(), stream.into());

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            obj.insert("stop".into(), serde_json::json!(stops));
        }
        if let Some(seed) = settings.seed {
            obj.insert("seed".into(), seed.into());
        }
        if let Some(ref user) = settings.user {
            obj.insert("user".into(), user.clone().into());
        }

        if let Some(ref tools) = request.tools {
            if !tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        serde_json::Value::Object(obj)
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, RelayError> {
        let resp = shared_client()
            .post(self.endpoint())
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, RelayError> {
        let body = self.build_request_body(request, false);
        debug!(provider = %self.provider, model = %self.model_id, "generate_text");

        let data: ChatResponse = self.send(&body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::api(200, "No choices in chat completion response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| AgentToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: parse_arguments(tc.function.arguments),
            })
            .collect();

        Ok(ProviderResponse {
            text: choice
                .message
                .content
                .map(|c| MessageContent::from_value(c).flatten())
                .unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, RelayError>>, RelayError> {
        let body = self.build_request_body(request, true);
        debug!(provider = %self.provider, model = %self.model_id, "stream_text");

        let byte_stream = self.send(&body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            let mut leftover: Vec<u8> = Vec::new();
            let mut pending = PendingToolCalls::default();
            let mut finish: Option<FinishReason> = None;
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(RelayError::Network(e));
                        return;
                    }
                };

                leftover.extend_from_slice(&chunk);
                buffer.push_str(&take_utf8(&mut leftover));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = parse_sse_data(&line) else { continue };
                    // Keep-alives and vendor extensions that do not parse are skipped.
                    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else { continue };

                    for choice in chunk.choices {
                        if let Some(content) = choice.delta.content {
                            let text = MessageContent::from_value(content).flatten();
                            if !text.is_empty() {
                                yield Ok(TextStreamDelta::text(text));
                            }
                        }
                        for delta in choice.delta.tool_calls.unwrap_or_default() {
                            pending.absorb(delta);
                        }
                        if let Some(reason) = choice.finish_reason.as_deref() {
                            finish = parse_finish_reason(reason).or(finish);
                        }
                    }
                }
            }

            for call in pending.finish() {
                yield Ok(TextStreamDelta::tool_call(call));
            }
            yield Ok(TextStreamDelta::done(finish));
        };

        Ok(Box::pin(stream))
    }
}

/// Tool-call fragments keyed by their stream index.
#[derive(Default)]
struct PendingToolCalls {
    calls: BTreeMap<u32, (String, String, String)>,
}

impl PendingToolCalls {
    fn absorb(&mut self, delta: StreamToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            entry.0 = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.1.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.2.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> Vec<AgentToolCall> {
        self.calls
            .into_iter()
            .map(|(index, (id, name, arguments))| AgentToolCall {
                id: if id.is_empty() { format!("call_{index}") } else { id },
                name,
                arguments: parse_arguments(arguments),
            })
            .collect()
    }
}

fn parse_arguments(raw: String) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> serde_json::Value {
    let content = match &msg.content {
        MessageContent::Text(text) => serde_json::Value::String(text.clone()),
        MessageContent::Parts(parts) => serde_json::Value::Array(parts.clone()),
    };

    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.text(),
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let tool_calls: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    let arguments = match &tc.arguments {
                        serde_json::Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": arguments },
                    })
                })
                .collect();
            let text = msg.text();
            serde_json::json!({
                "role": "assistant",
                "content": if text.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(text) },
                "tool_calls": tool_calls,
            })
        }
        role => serde_json::json!({ "role": role.to_string(), "content": content }),
    }
}

// Chat Completions wire types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<serde_json::Value>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<serde_json::Value>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
