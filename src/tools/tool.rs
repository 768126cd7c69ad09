//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::agent::events::RawEvent;
use crate::error::RelayError;
use crate::provider::ToolDefinition;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Id of the model tool call being answered.
    pub tool_call_id: String,
    pub thread_id: Option<String>,
    events: Option<mpsc::UnboundedSender<RawEvent>>,
}

impl ToolExecutionContext {
    pub fn new(tool_call_id: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            thread_id,
            events: None,
        }
    }

    /// Attach the channel nested events are forwarded on.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RawEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Forward a nested event to the enclosing run. Dropped silently when
    /// nobody is listening.
    pub fn emit(&self, event: RawEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }
}

/// A named operation the model can call. Text in, text out.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Run the tool. An `Err` is reported back to the model as text.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<String, RelayError>;

    /// The definition advertised to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, RelayError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, RelayError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<String, RelayError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool() -> AgentTool {
        AgentTool::new(
            "echo",
            "Echo the text argument",
            AgentToolParameters::object().string("text", "Text to echo", true).build(),
            |args, ctx| async move {
                ctx.emit(RawEvent::internal_token("echo", "nested"));
                Ok(args.get_str("text")?.to_string())
            },
        )
    }

    #[tokio::test]
    async fn closure_tool_executes_and_forwards_nested_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ToolExecutionContext::new("call_1", None).with_events(tx);
        let out = echo_tool()
            .execute(&ToolArguments::new(json!({"text": "hi"})), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "hi");
        assert!(rx.recv().await.unwrap().is_internal());
    }

    #[tokio::test]
    async fn emit_without_listener_is_a_no_op() {
        let out = echo_tool()
            .execute(&ToolArguments::new(json!({"text": "x"})), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn definition_carries_schema() {
        let def = echo_tool().definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.parameters["required"], json!(["text"]));
    }
}
