//! Model provider trait and the chat-completions transport.
//!
//! Inference itself is an external collaborator; this module only speaks
//! the wire protocol of the hosted model APIs.

pub mod http;
pub mod openai;
pub mod sanitize;

pub use sanitize::sanitize_tool_result_pairing;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::models::LanguageModel;
use crate::types::{AgentToolCall, FinishReason, GenerationSettings, ModelMessage, TextStreamDelta};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Generate a complete response.
    async fn generate_text(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, RelayError>;

    /// Generate a response as a stream of deltas. Tool calls arrive fully
    /// assembled, after the text deltas of the same response.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, RelayError>>, RelayError>;
}

/// Create a provider for the given model, using the provided config.
pub fn create_provider(
    model: &LanguageModel,
    config: &RelayConfig,
) -> Result<Arc<dyn ModelProvider>, RelayError> {
    let api_key = config.get_api_key(model.provider).ok_or_else(|| {
        RelayError::Authentication(format!(
            "Missing {} for model '{model}'",
            model.provider.api_key_env_vars().join(" or ")
        ))
    })?;
    Ok(Arc::new(openai::OpenAiCompatibleProvider::new(
        model.provider,
        model.model_id(),
        api_key,
        config.get_base_url(model.provider),
    )))
}
