//! Tool-calling agent loop.
//!
//! [`ToolLoopAgent`] is the executor behind every catalog agent: call the
//! model, run the tools it asks for, feed the results back, and repeat
//! until the model answers without tool calls. Every step is committed to
//! the thread as soon as it happens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checkpoint::MemoryCheckpointer;
use super::conversation::Conversation;
use super::events::RawEvent;
use super::executor::{AgentExecutor, AgentInput, AgentState, RawEventStream, RunConfig};
use crate::config::DEFAULT_TOOL_TIMEOUT;
use crate::error::RelayError;
use crate::provider::{sanitize_tool_result_pairing, ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{Tool, ToolArguments, ToolExecutionContext};
use crate::types::{AgentToolCall, GenerationSettings, MessageContent, ModelMessage, StreamEventType};
use crate::util::timeout::with_timeout;

pub const DEFAULT_RECURSION_LIMIT: usize = 25;

type EventSink = mpsc::UnboundedSender<RawEvent>;

#[derive(Clone, Builder)]
pub struct ToolLoopAgent {
    #[builder(into)]
    name: String,
    provider: Arc<dyn ModelProvider>,
    #[builder(into, default)]
    system_prompt: String,
    #[builder(default)]
    tools: Vec<Arc<dyn Tool>>,
    #[builder(default)]
    settings: GenerationSettings,
    #[builder(default = Arc::new(MemoryCheckpointer::new()))]
    checkpointer: Arc<MemoryCheckpointer>,
    /// Model calls allowed per turn.
    #[builder(default = DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,
    /// Budget for a single tool call.
    #[builder(default = DEFAULT_TOOL_TIMEOUT)]
    tool_timeout: Duration,
}

impl std::fmt::Debug for ToolLoopAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoopAgent")
            .field("name", &self.name)
            .field("model", &self.provider.model_id())
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ToolLoopAgent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checkpointer(&self) -> &Arc<MemoryCheckpointer> {
        &self.checkpointer
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.iter().map(|t| t.definition()).collect())
        }
    }

    fn request(&self, history: &[ModelMessage]) -> ProviderRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(ModelMessage::system(self.system_prompt.clone()));
        }
        messages.extend(sanitize_tool_result_pairing(history));
        ProviderRequest {
            messages,
            settings: self.settings.clone(),
            tools: self.tool_definitions(),
        }
    }

    /// Run one turn against `conversation`, reporting progress on `sink`.
    async fn run_turn(
        &self,
        conversation: &mut Conversation,
        input: AgentInput,
        thread_id: Option<String>,
        sink: &EventSink,
    ) -> Result<(), RelayError> {
        let run_id = Uuid::new_v4().to_string();
        info!(agent = %self.name, thread_id = ?thread_id, run_id = %run_id, "turn start");
        emit(sink, RawEvent::ChainStart {
            name: self.name.clone(),
            run_id: run_id.clone(),
        });
        conversation.extend(input.messages);

        let model = self.provider.model_id().to_string();
        for step in 1..=self.recursion_limit {
            let request = self.request(conversation.messages());
            emit(sink, RawEvent::ChatModelStart {
                name: model.clone(),
                tags: Vec::new(),
            });

            let mut stream = self.provider.stream_text(&request).await?;
            let mut text = String::new();
            let mut calls: Vec<AgentToolCall> = Vec::new();
            while let Some(delta) = stream.next().await {
                let delta = delta?;
                match delta.event_type {
                    StreamEventType::TextDelta => {
                        if !delta.text.is_empty() {
                            text.push_str(&delta.text);
                            emit(sink, RawEvent::token(model.clone(), delta.text));
                        }
                    }
                    StreamEventType::ToolCallDelta => calls.extend(delta.tool_call),
                    StreamEventType::Done => break,
                }
            }
            emit(sink, RawEvent::ChatModelEnd {
                name: model.clone(),
                tags: Vec::new(),
            });
            debug!(agent = %self.name, step, tool_calls = calls.len(), text_len = text.len(), "model step complete");

            if calls.is_empty() {
                conversation.add_message(ModelMessage::assistant(text.clone()));
                emit(sink, RawEvent::ChainEnd {
                    name: self.name.clone(),
                    run_id,
                    output: Some(MessageContent::Text(text)),
                });
                info!(agent = %self.name, steps = step, "turn complete");
                return Ok(());
            }

            conversation.add_message(ModelMessage::assistant_with_tool_calls(text, calls.clone()));
            for call in calls {
                emit(sink, RawEvent::tool_start(&call.name, &call.id, call.arguments.clone()));
                let ctx = ToolExecutionContext::new(&call.id, thread_id.clone()).with_events(sink.clone());
                let output = self.execute_tool(&call, &ctx).await;
                emit(sink, RawEvent::ToolEnd {
                    name: call.name.clone(),
                    run_id: call.id.clone(),
                    output: output.clone(),
                });
                conversation.add_message(ModelMessage::tool_result(call.id, call.name, output));
            }
        }

        Err(RelayError::agent(format!(
            "Recursion limit of {} reached without a final answer",
            self.recursion_limit
        )))
    }

    /// Run a tool call. Failures become text for the model.
    async fn execute_tool(&self, call: &AgentToolCall, ctx: &ToolExecutionContext) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!(agent = %self.name, tool = %call.name, "model requested unknown tool");
            return format!("Error: tool '{}' not found", call.name);
        };
        let args = ToolArguments::new(call.arguments.clone());
        match with_timeout(self.tool_timeout, tool.execute(&args, ctx)).await {
            Ok(output) => output,
            Err(e) => {
                warn!(agent = %self.name, tool = %call.name, error = %e, "tool failed");
                format!("Error: {e}")
            }
        }
    }
}

fn emit(sink: &EventSink, event: RawEvent) {
    let _ = sink.send(event);
}

enum Progress {
    Event(RawEvent),
    Finished(Result<(), RelayError>),
}

#[async_trait]
impl AgentExecutor for ToolLoopAgent {
    async fn invoke(&self, input: AgentInput, config: RunConfig) -> Result<AgentState, RelayError> {
        let mut thread = self.checkpointer.checkout(config.thread_id.as_deref()).await;
        // Nobody listens in synchronous mode.
        let (sink, _) = mpsc::unbounded_channel();
        self.run_turn(&mut thread, input, config.thread_id, &sink).await?;
        Ok(AgentState {
            messages: thread.messages().to_vec(),
        })
    }

    fn stream_events(&self, input: AgentInput, config: RunConfig) -> RawEventStream {
        let agent = self.clone();
        Box::pin(async_stream::stream! {
            let (sink, mut events) = mpsc::unbounded_channel();
            let turn = async move {
                let mut thread = agent.checkpointer.checkout(config.thread_id.as_deref()).await;
                agent.run_turn(&mut thread, input, config.thread_id, &sink).await
            };
            tokio::pin!(turn);

            let outcome = loop {
                let progress = tokio::select! {
                    biased;
                    Some(event) = events.recv() => Progress::Event(event),
                    result = &mut turn => Progress::Finished(result),
                };
                match progress {
                    Progress::Event(event) => yield Ok(event),
                    Progress::Finished(result) => break result,
                }
            };

            while let Ok(event) = events.try_recv() {
                yield Ok(event);
            }
            if let Err(e) = outcome {
                yield Err(e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderResponse;
    use crate::tools::{AgentTool, AgentToolParameters};
    use crate::types::{Role, TextStreamDelta};
    use futures::stream::BoxStream;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays one scripted response per model call.
    struct ScriptedProvider {
        turns: Mutex<Vec<Vec<TextStreamDelta>>>,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(mut turns: Vec<Vec<TextStreamDelta>>) -> Arc<Self> {
            turns.reverse();
            Arc::new(Self {
                turns: Mutex::new(turns),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "openai"
        }

        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate_text(&self, _: &ProviderRequest) -> Result<ProviderResponse, RelayError> {
            unreachable!("the agent loop streams")
        }

        async fn stream_text(
            &self,
            request: &ProviderRequest,
        ) -> Result<BoxStream<'static, Result<TextStreamDelta, RelayError>>, RelayError> {
            self.seen.lock().unwrap().push(request.clone());
            let turn = self
                .turns
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| RelayError::Stream("script exhausted".into()))?;
            Ok(Box::pin(futures::stream::iter(turn.into_iter().map(Ok))))
        }
    }

    fn call(name: &str, args: serde_json::Value) -> TextStreamDelta {
        TextStreamDelta::tool_call(AgentToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args,
        })
    }

    fn shout_tool() -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            "shout",
            "Upper-case the text",
            AgentToolParameters::object().string("text", "Text", true).build(),
            |args, ctx| async move {
                ctx.emit(RawEvent::internal_token("helper", "thinking"));
                Ok(args.get_str("text")?.to_uppercase())
            },
        ))
    }

    #[tokio::test]
    async fn plain_answer_is_appended_to_history() {
        let provider = ScriptedProvider::new(vec![vec![
            TextStreamDelta::text("hi"),
            TextStreamDelta::done(None),
        ]]);
        let agent = ToolLoopAgent::builder()
            .name("chatbot")
            .provider(provider.clone())
            .system_prompt("be kind")
            .build();

        let state = agent.invoke(AgentInput::user("hello"), RunConfig::default()).await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.last_message().unwrap().text(), "hi");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].messages[0].role, Role::System);
        assert!(seen[0].tools.is_none());
    }

    #[tokio::test]
    async fn tool_calls_are_executed_and_fed_back() {
        let provider = ScriptedProvider::new(vec![
            vec![call("shout", json!({"text": "hey"})), TextStreamDelta::done(None)],
            vec![TextStreamDelta::text("done: HEY"), TextStreamDelta::done(None)],
        ]);
        let agent = ToolLoopAgent::builder()
            .name("coder_agent")
            .provider(provider.clone())
            .tools(vec![shout_tool()])
            .build();

        let events: Vec<RawEvent> = agent
            .stream_events(AgentInput::user("shout hey"), RunConfig::thread("t"))
            .map(|e| e.unwrap())
            .collect()
            .await;

        let tool_start = events
            .iter()
            .position(|e| matches!(e, RawEvent::ToolStart { name, .. } if name == "shout"))
            .unwrap();
        assert!(events[tool_start + 1].is_internal());
        assert!(matches!(&events[tool_start + 2], RawEvent::ToolEnd { output, .. } if output == "HEY"));
        assert!(matches!(events.last(), Some(RawEvent::ChainEnd { .. })));

        let thread = agent.checkpointer().get("t").unwrap();
        let history = thread.lock().await;
        let roles: Vec<Role> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[1].messages.last().unwrap().text(), "HEY");
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_become_text() {
        let provider = ScriptedProvider::new(vec![
            vec![
                call("missing", json!({})),
                call("shout", json!({})),
                TextStreamDelta::done(None),
            ],
            vec![TextStreamDelta::text("sorry"), TextStreamDelta::done(None)],
        ]);
        let agent = ToolLoopAgent::builder()
            .name("a")
            .provider(provider)
            .tools(vec![shout_tool()])
            .build();

        let state = agent.invoke(AgentInput::user("x"), RunConfig::default()).await.unwrap();
        let tool_outputs: Vec<String> = state
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.text())
            .collect();
        assert_eq!(tool_outputs[0], "Error: tool 'missing' not found");
        assert!(tool_outputs[1].starts_with("Error: Invalid argument"));
    }

    #[tokio::test]
    async fn recursion_limit_fails_the_turn() {
        let looping = (0..3)
            .map(|_| vec![call("shout", json!({"text": "again"})), TextStreamDelta::done(None)])
            .collect();
        let agent = ToolLoopAgent::builder()
            .name("a")
            .provider(ScriptedProvider::new(looping))
            .tools(vec![shout_tool()])
            .recursion_limit(2)
            .build();

        let err = agent.invoke(AgentInput::user("x"), RunConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("Recursion limit of 2"));
    }

    #[tokio::test]
    async fn provider_failure_ends_stream_with_error_after_events() {
        let agent = ToolLoopAgent::builder()
            .name("a")
            .provider(ScriptedProvider::new(vec![]))
            .build();

        let items: Vec<Result<RawEvent, RelayError>> = agent
            .stream_events(AgentInput::user("x"), RunConfig::default())
            .collect()
            .await;
        assert!(matches!(items[0], Ok(RawEvent::ChainStart { .. })));
        assert!(matches!(items.last(), Some(Err(RelayError::Stream(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_as_text() {
        let slow: Arc<dyn Tool> = Arc::new(AgentTool::new(
            "slow",
            "Never finishes in time",
            AgentToolParameters::object().build(),
            |_, _| async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok("late".to_string())
            },
        ));
        let provider = ScriptedProvider::new(vec![
            vec![call("slow", json!({})), TextStreamDelta::done(None)],
            vec![TextStreamDelta::text("gave up"), TextStreamDelta::done(None)],
        ]);
        let agent = ToolLoopAgent::builder()
            .name("a")
            .provider(provider)
            .tools(vec![slow])
            .tool_timeout(Duration::from_secs(1))
            .build();

        let state = agent.invoke(AgentInput::user("x"), RunConfig::default()).await.unwrap();
        assert!(state.messages[2].text().starts_with("Error: "));
        assert_eq!(state.last_message().unwrap().text(), "gave up");
    }
}
