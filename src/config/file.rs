//! TOML config file.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! turn_timeout_secs = 300
//!
//! [tools]
//! artifact_dir = "./code_artifacts"
//! browser_url = "http://localhost:7788"
//!
//! [agents.coder_agent]
//! model = "openai:gpt-4o-mini"
//! temperature = 0.1
//!
//! [agents.navigator_agent]
//! enabled = false
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub tools: Option<ToolsSection>,
    #[serde(default)]
    pub agents: HashMap<String, AgentOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub turn_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    pub artifact_dir: Option<PathBuf>,
    pub browser_url: Option<String>,
    pub tool_timeout_secs: Option<u64>,
}

/// Per-agent overrides of the built-in catalog.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AgentOverride {
    /// "provider:model" selector.
    pub model: Option<String>,
    pub temperature: Option<f64>,
    /// Set to `false` to keep the agent out of the router.
    pub enabled: Option<bool>,
}

impl FileConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RelayError::Configuration(format!("invalid config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }
}
