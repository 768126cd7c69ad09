//! The capability every routed agent exposes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::events::RawEvent;
use crate::error::RelayError;
use crate::types::ModelMessage;

/// Per-call configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Conversation to continue. `None` runs a stateless single turn.
    pub thread_id: Option<String>,
}

impl RunConfig {
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
        }
    }
}

/// Messages to append to the thread before the turn runs.
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub messages: Vec<ModelMessage>,
}

impl AgentInput {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ModelMessage::user(text)],
        }
    }
}

/// Thread state after a completed turn.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub messages: Vec<ModelMessage>,
}

impl AgentState {
    /// The answer of the turn.
    pub fn last_message(&self) -> Option<&ModelMessage> {
        self.messages.last()
    }
}

pub type RawEventStream = BoxStream<'static, Result<RawEvent, RelayError>>;

/// An agent the router can drive in either mode.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the turn to completion and return the resulting state.
    async fn invoke(&self, input: AgentInput, config: RunConfig) -> Result<AgentState, RelayError>;

    /// Run the turn, yielding raw lifecycle events as they happen. A failure
    /// ends the stream with an `Err` item. Dropping the stream cancels the
    /// turn.
    fn stream_events(&self, input: AgentInput, config: RunConfig) -> RawEventStream;
}
