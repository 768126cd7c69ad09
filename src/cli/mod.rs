//! CLI entry point for the relay.

pub mod chat;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::DEFAULT_BASE_URL;
use crate::config::{FileConfig, RelayConfig};
use crate::error::Result;
use crate::server;

/// Multi-agent relay server and console client.
#[derive(Parser, Debug)]
#[command(name = "agent-relay", version, about = "Multi-agent relay server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Chat with a running server
    Chat(ChatArgs),
}

/// Arguments for `agent-relay serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bind host (overrides RELAY_HOST and the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides RELAY_PORT and the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// TOML config file
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for `agent-relay chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Server base URL
    #[arg(long, env = "RELAY_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Agent to talk to
    #[arg(short, long, default_value = "chatbot")]
    pub agent: String,

    /// Conversation thread (a fresh one is generated when omitted)
    #[arg(short, long)]
    pub thread: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl ServeArgs {
    /// Layer env, the config file and these flags, in that order.
    pub fn load_config(&self) -> Result<RelayConfig> {
        let mut config = RelayConfig::from_env();
        if let Some(path) = &self.config {
            config.apply_file(FileConfig::load(path)?);
            info!(path = %path.display(), "loaded config file");
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

/// Build every agent and serve until Ctrl-C.
pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = args.load_config()?;
    let registry = server::build_registry(&config);
    if registry.is_empty() {
        warn!("no agents loaded; check model credentials");
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        trigger.cancel();
    });

    server::serve(&config, Arc::new(registry), shutdown).await
}
