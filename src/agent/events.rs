//! Raw lifecycle events produced by an agent run.
//!
//! This is the single tagged union every capability emits. The relay layer
//! normalizes it into wire events; anything it does not recognize is
//! deserialized as [`RawEvent::Other`] and ignored downstream.

use serde::{Deserialize, Serialize};

use crate::types::MessageContent;

/// Tag marking model output that belongs to an internal helper call
/// (for example a vision request made by a tool) and must not be streamed.
pub const INTERNAL_TAG: &str = "exclude_from_stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RawEvent {
    ChainStart {
        name: String,
        run_id: String,
    },
    ChainEnd {
        name: String,
        run_id: String,
        #[serde(default)]
        output: Option<MessageContent>,
    },
    ChatModelStart {
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    ChatModelStream {
        name: String,
        chunk: MessageContent,
        #[serde(default)]
        tags: Vec<String>,
    },
    ChatModelEnd {
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    ToolStart {
        name: String,
        run_id: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolEnd {
        name: String,
        run_id: String,
        output: String,
    },
    #[serde(other)]
    Other,
}

impl RawEvent {
    pub fn token(name: impl Into<String>, chunk: impl Into<MessageContent>) -> Self {
        Self::ChatModelStream {
            name: name.into(),
            chunk: chunk.into(),
            tags: Vec::new(),
        }
    }

    pub fn internal_token(name: impl Into<String>, chunk: impl Into<MessageContent>) -> Self {
        Self::ChatModelStream {
            name: name.into(),
            chunk: chunk.into(),
            tags: vec![INTERNAL_TAG.to_string()],
        }
    }

    pub fn tool_start(name: impl Into<String>, run_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolStart {
            name: name.into(),
            run_id: run_id.into(),
            input,
        }
    }

    /// Whether the event carries the internal tag.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::ChatModelStart { tags, .. }
            | Self::ChatModelStream { tags, .. }
            | Self::ChatModelEnd { tags, .. } => tags.iter().any(|t| t == INTERNAL_TAG),
            _ => false,
        }
    }
}
