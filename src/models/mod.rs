//! Model identifiers.

pub mod provider_key;

pub use provider_key::ProviderKey;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// A concrete model on a concrete provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LanguageModel {
    pub provider: ProviderKey,
    pub model_id: String,
}

impl LanguageModel {
    pub fn new(provider: ProviderKey, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    /// Get the model's API identifier string.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Get the canonical provider name.
    pub fn provider_name(&self) -> String {
        self.provider.to_string()
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

impl FromStr for LanguageModel {
    type Err = RelayError;

    /// Parse "provider:model_id", e.g. "openai:gpt-4o" or "google:gemini-flash-latest".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model_id) = s.split_once(':').ok_or_else(|| {
            RelayError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            ))
        })?;
        if model_id.is_empty() {
            return Err(RelayError::InvalidArgument(format!(
                "Invalid model selector '{s}': empty model id"
            )));
        }
        let provider = provider
            .parse::<ProviderKey>()
            .map_err(|_| RelayError::ModelNotFound(format!("Unknown provider '{provider}'")))?;
        Ok(Self::new(provider, model_id))
    }
}
