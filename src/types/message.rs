//! Message types for model communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Tool calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AgentToolCall>,
    /// The call a `tool` message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ModelMessage {
    fn with_role(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, MessageContent::Text(text.into()))
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, MessageContent::Text(text.into()))
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, MessageContent::Text(text.into()))
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: Vec<AgentToolCall>) -> Self {
        let mut message = Self::assistant(text);
        message.tool_calls = calls;
        message
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let mut message = Self::with_role(Role::Tool, MessageContent::Text(output.into()));
        message.tool_call_id = Some(tool_call_id.into());
        message.name = Some(tool_name.into());
        message
    }

    /// Create a user message with an inline image.
    pub fn user_with_image(text: impl Into<String>, image_data: &str, mime_type: &str) -> Self {
        Self::with_role(
            Role::User,
            MessageContent::Parts(vec![
                serde_json::json!({ "type": "text", "text": text.into() }),
                serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{mime_type};base64,{image_data}") },
                }),
            ]),
        )
    }

    /// The flattened text of this message.
    pub fn text(&self) -> String {
        self.content.flatten()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: plain text, or a provider-shaped list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl MessageContent {
    /// Interpret an arbitrary JSON value as content.
    ///
    /// Strings stay text, arrays become parts, `null` is empty text and any
    /// other value is stringified.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            serde_json::Value::Array(parts) => Self::Parts(parts),
            serde_json::Value::Null => Self::Text(String::new()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Reduce the content to a single string.
    ///
    /// Text passes through unchanged. For parts, the `text` of every
    /// `{"type": "text"}` part is concatenated in order; bare strings are
    /// kept, other scalars are stringified and every other typed part
    /// (images, tool payloads) is dropped.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts.iter().filter_map(flatten_part).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

fn flatten_part(part: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match part {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("text") => map.get("text").map(|text| match text {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            }),
            _ => None,
        },
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}
