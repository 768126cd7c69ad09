//! Convenience re-exports for common use.

pub use crate::agent::{AgentExecutor, AgentInput, AgentState, RawEvent, RawEventStream, RunConfig, ToolLoopAgent};
pub use crate::client::AgentClient;
pub use crate::config::RelayConfig;
pub use crate::error::{RelayError, Result};
pub use crate::models::LanguageModel;
pub use crate::provider::ModelProvider;
pub use crate::relay::{AgentRegistry, ChatMessage, WireEvent};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments};
pub use crate::types::{GenerationSettings, MessageContent, ModelMessage, Role, TextStreamDelta};
