//! Agent registry and the uniform invoke/stream surface.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::normalize::{normalize, panic_message};
use super::wire::WireEvent;
use crate::agent::{AgentDefinition, AgentExecutor, AgentInput, BuildContext, RawEventStream, RunConfig};
use crate::error::RelayError;
use crate::util::timeout::with_optional_timeout;

/// Final answer of a synchronous call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl ChatMessage {
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            kind: "ai".to_string(),
            content: content.into(),
        }
    }
}

/// One registered agent.
pub struct AgentHandle {
    name: String,
    tag: String,
    executor: Arc<dyn AgentExecutor>,
    turn_timeout: Option<Duration>,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("turn_timeout", &self.turn_timeout)
            .finish_non_exhaustive()
    }
}

impl AgentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Run one user turn to completion and return the flattened answer.
    pub async fn invoke(&self, message: &str, thread_id: Option<String>) -> Result<ChatMessage, RelayError> {
        let run = self.executor.invoke(AgentInput::user(message), RunConfig { thread_id });
        let outcome = AssertUnwindSafe(with_optional_timeout(self.turn_timeout, run))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(RelayError::agent(format!("Agent panicked: {}", panic_message(panic.as_ref()))))
            });

        let state = outcome.inspect_err(|e| {
            error!(agent = %self.name, error = %e, category = ?e.category(), "invocation failed");
        })?;
        let last = state
            .last_message()
            .ok_or_else(|| RelayError::agent("Agent returned no messages"))?;
        Ok(ChatMessage::ai(last.text()))
    }

    /// Run one user turn as a wire event stream. Always ends with `end`.
    pub fn stream(
        &self,
        message: &str,
        thread_id: Option<String>,
        stream_tokens: bool,
    ) -> BoxStream<'static, WireEvent> {
        let raw = self
            .executor
            .stream_events(AgentInput::user(message), RunConfig { thread_id });
        normalize(bounded(raw, self.turn_timeout), stream_tokens)
    }
}

/// Cut a raw stream off with a timeout error once `limit` has elapsed.
fn bounded(raw: RawEventStream, limit: Option<Duration>) -> RawEventStream {
    let Some(limit) = limit else { return raw };
    Box::pin(async_stream::stream! {
        let deadline = tokio::time::Instant::now() + limit;
        let mut raw = raw;
        loop {
            match tokio::time::timeout_at(deadline, raw.next()).await {
                Ok(Some(item)) => yield item,
                Ok(None) => break,
                Err(_) => {
                    yield Err(RelayError::Timeout(limit.as_millis() as u64));
                    break;
                }
            }
        }
    })
}

/// Name → agent table. Fixed once the server starts.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<AgentHandle>>,
    turn_timeout: Option<Duration>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every turn of agents registered from now on.
    pub fn with_turn_timeout(mut self, turn_timeout: Option<Duration>) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    /// Register an agent. A name can be registered once; later attempts
    /// are rejected and the first registration stays.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        tag: impl Into<String>,
        executor: Arc<dyn AgentExecutor>,
    ) -> Result<(), RelayError> {
        let name = name.into();
        if self.contains(&name) {
            warn!(agent = %name, "duplicate registration rejected");
            return Err(RelayError::DuplicateAgent(name));
        }
        info!(agent = %name, "agent registered");
        self.agents.push(Arc::new(AgentHandle {
            name,
            tag: tag.into(),
            executor,
            turn_timeout: self.turn_timeout,
        }));
        Ok(())
    }

    /// Build and register every definition. One that cannot be built is
    /// skipped with a warning.
    pub fn from_definitions(definitions: &[AgentDefinition], ctx: &BuildContext) -> Self {
        let mut registry = Self::new().with_turn_timeout(ctx.config.turn_timeout);
        for def in definitions {
            let registered = def
                .build(ctx)
                .and_then(|executor| registry.register(def.name, def.tag, executor));
            if let Err(e) = registered {
                warn!(agent = def.name, error = %e, "agent not loaded");
            }
        }
        registry
    }

    pub fn get(&self, name: &str) -> Result<Arc<AgentHandle>, RelayError> {
        self.agents
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| RelayError::AgentNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub async fn invoke(
        &self,
        agent: &str,
        message: &str,
        thread_id: Option<String>,
    ) -> Result<ChatMessage, RelayError> {
        self.get(agent)?.invoke(message, thread_id).await
    }

    pub fn stream(
        &self,
        agent: &str,
        message: &str,
        thread_id: Option<String>,
        stream_tokens: bool,
    ) -> Result<BoxStream<'static, WireEvent>, RelayError> {
        Ok(self.get(agent)?.stream(message, thread_id, stream_tokens))
    }
}
