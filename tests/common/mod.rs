//! Shared test helpers: stub agents and a history-aware mock model.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use agent_relay::agent::{
    AgentExecutor, AgentInput, AgentState, RawEvent, RawEventStream, RunConfig, ToolLoopAgent,
};
use agent_relay::error::RelayError;
use agent_relay::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use agent_relay::relay::AgentRegistry;
use agent_relay::types::*;

/// What a [`StubExecutor`] does when driven.
#[derive(Clone)]
enum Script {
    Reply(String),
    FailAfter { tokens: Vec<String>, error: String },
    Panic,
    Hang,
}

/// An agent with a fixed behaviour that records every call it receives.
#[derive(Clone)]
pub struct StubExecutor {
    script: Script,
    pub calls: Arc<Mutex<Vec<(Vec<ModelMessage>, RunConfig)>>>,
}

impl StubExecutor {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers `text`, streaming it as a single token.
    pub fn replying(text: &str) -> Self {
        Self::with(Script::Reply(text.to_string()))
    }

    /// Streams `tokens`, then fails with `error`. `invoke` fails outright.
    pub fn failing_after(tokens: &[&str], error: &str) -> Self {
        Self::with(Script::FailAfter {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            error: error.to_string(),
        })
    }

    pub fn panicking() -> Self {
        Self::with(Script::Panic)
    }

    /// Never finishes.
    pub fn hanging() -> Self {
        Self::with(Script::Hang)
    }

    pub fn into_arc(self) -> Arc<dyn AgentExecutor> {
        Arc::new(self)
    }

    fn record(&self, input: &AgentInput, config: &RunConfig) {
        self.calls
            .lock()
            .unwrap()
            .push((input.messages.clone(), config.clone()));
    }
}

#[async_trait]
impl AgentExecutor for StubExecutor {
    async fn invoke(&self, input: AgentInput, config: RunConfig) -> Result<AgentState, RelayError> {
        self.record(&input, &config);
        match &self.script {
            Script::Reply(text) => {
                let mut messages = input.messages;
                messages.push(ModelMessage::assistant(text.clone()));
                Ok(AgentState { messages })
            }
            Script::FailAfter { error, .. } => Err(RelayError::agent(error.clone())),
            Script::Panic => panic!("stub agent panicked"),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AgentState::default())
            }
        }
    }

    fn stream_events(&self, input: AgentInput, config: RunConfig) -> RawEventStream {
        self.record(&input, &config);
        let script = self.script.clone();
        Box::pin(async_stream::stream! {
            yield Ok(RawEvent::ChainStart { name: "stub".into(), run_id: "run-1".into() });
            match script {
                Script::Reply(text) => {
                    yield Ok(RawEvent::token("stub-model", text));
                }
                Script::FailAfter { tokens, error } => {
                    for token in tokens {
                        yield Ok(RawEvent::token("stub-model", token));
                    }
                    yield Err(RelayError::agent(error));
                }
                Script::Panic => panic!("stub agent panicked"),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            }
        })
    }
}

/// Model that answers with how many user messages it has seen so far and
/// echoes the last one, e.g. `"#2 how are you"`.
pub struct EchoProvider;

impl EchoProvider {
    fn answer(request: &ProviderRequest) -> String {
        let users: Vec<&ModelMessage> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        let last = users.last().map(|m| m.text()).unwrap_or_default();
        format!("#{} {}", users.len(), last)
    }
}

#[async_trait]
impl ModelProvider for EchoProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        "echo"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, RelayError> {
        Ok(ProviderResponse {
            text: Self::answer(request),
            tool_calls: vec![],
            finish_reason: Some(FinishReason::Stop),
        })
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, RelayError>>, RelayError> {
        let answer = Self::answer(request);
        let deltas = vec![
            Ok(TextStreamDelta::text(answer)),
            Ok(TextStreamDelta::done(Some(FinishReason::Stop))),
        ];
        Ok(Box::pin(futures::stream::iter(deltas)))
    }
}

/// A real tool-loop agent backed by [`EchoProvider`].
pub fn echo_agent(name: &str) -> Arc<dyn AgentExecutor> {
    Arc::new(
        ToolLoopAgent::builder()
            .name(name)
            .provider(Arc::new(EchoProvider))
            .system_prompt("You echo.")
            .build(),
    )
}

/// Registry with a stub `chatbot` answering "hi" and an echo agent.
pub fn sample_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry
        .register("chatbot", "Chatbot", StubExecutor::replying("hi").into_arc())
        .unwrap();
    registry
        .register("echo", "Echo", echo_agent("echo"))
        .unwrap();
    registry
        .register(
            "flaky",
            "Flaky",
            StubExecutor::failing_after(&["partial"], "model exploded").into_arc(),
        )
        .unwrap();
    registry
}
