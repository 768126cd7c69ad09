//! Configuration system (layered: CLI > TOML file > env > `.env` > defaults).

pub mod file;

pub use file::{AgentOverride, FileConfig};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::models::ProviderKey;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ARTIFACT_DIR: &str = "code_artifacts";
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Layered configuration for the relay server and its agents.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    api_keys: Arc<RwLock<HashMap<ProviderKey, String>>>,
    base_urls: Arc<RwLock<HashMap<ProviderKey, String>>>,
    pub tavily_api_key: Option<String>,
    pub host: String,
    pub port: u16,
    /// Working directory for generated code and file search.
    pub artifact_dir: PathBuf,
    /// Browser automation sidecar. The navigator agent is only loaded when set.
    pub browser_url: Option<String>,
    /// Patience budget for a single tool call.
    pub tool_timeout: Duration,
    /// Optional upper bound on a whole agent turn.
    pub turn_timeout: Option<Duration>,
    pub agents: HashMap<String, AgentOverride>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayConfig {
    /// Empty config with defaults and no credentials.
    pub fn new() -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            tavily_api_key: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            browser_url: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            turn_timeout: None,
            agents: HashMap::new(),
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
            Err(_) => tracing::debug!("no .env file found"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        for provider in ProviderKey::ALL {
            if let Some(key) = provider
                .api_key_env_vars()
                .iter()
                .find_map(|var| lookup(var).filter(|v| !v.is_empty()))
            {
                config.set_api_key(provider, key);
            }
            if let Some(url) = lookup(provider.base_url_env_var()) {
                config.set_base_url(provider, url);
            }
        }

        config.tavily_api_key = lookup("TAVILY_API_KEY").filter(|v| !v.is_empty());
        if let Some(host) = lookup("RELAY_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(dir) = lookup("RELAY_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        config.browser_url = lookup("BROWSER_AGENT_URL").filter(|v| !v.is_empty());
        if let Some(secs) = lookup("RELAY_TOOL_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.tool_timeout = Duration::from_secs(secs);
        }
        config.turn_timeout = lookup("RELAY_TURN_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs);

        config
    }

    /// Overlay values from a TOML config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(secs) = server.turn_timeout_secs {
                self.turn_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        if let Some(tools) = file.tools {
            if let Some(dir) = tools.artifact_dir {
                self.artifact_dir = dir;
            }
            if tools.browser_url.is_some() {
                self.browser_url = tools.browser_url;
            }
            if let Some(secs) = tools.tool_timeout_secs {
                self.tool_timeout = Duration::from_secs(secs);
            }
        }
        self.agents.extend(file.agents);
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| RelayError::Configuration(format!("invalid bind address: {e}")))
    }

    pub fn set_api_key(&self, provider: ProviderKey, key: String) {
        self.api_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, key);
    }

    pub fn get_api_key(&self, provider: ProviderKey) -> Option<String> {
        self.api_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
    }

    pub fn set_base_url(&self, provider: ProviderKey, url: String) {
        self.base_urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, url);
    }

    /// Base URL for a provider, falling back to its public endpoint.
    pub fn get_base_url(&self, provider: ProviderKey) -> String {
        self.base_urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| provider.default_base_url().to_string())
    }

    pub fn has_credentials(&self, provider: ProviderKey) -> bool {
        self.get_api_key(provider).is_some()
    }

    /// Per-agent override block, if any.
    pub fn agent(&self, name: &str) -> Option<&AgentOverride> {
        self.agents.get(name)
    }
}
