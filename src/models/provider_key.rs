//! Typed provider identifiers and alias handling.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Providers the relay can talk to. Both speak the OpenAI chat-completions
/// dialect; Google through its OpenAI-compatible endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKey {
    #[strum(to_string = "openai")]
    OpenAi,
    #[strum(to_string = "google", serialize = "gemini", serialize = "google_genai")]
    Google,
}

impl ProviderKey {
    /// Default API base URL.
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Environment variables that may hold this provider's API key, in priority order.
    pub const fn api_key_env_vars(self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        }
    }

    /// Environment variable overriding the base URL.
    pub const fn base_url_env_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_BASE_URL",
            Self::Google => "GOOGLE_BASE_URL",
        }
    }

    pub const ALL: [ProviderKey; 2] = [Self::OpenAi, Self::Google];
}
