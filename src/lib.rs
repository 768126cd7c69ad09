//! agent-relay: route conversations to specialized agents over HTTP.
//!
//! Each agent is exposed as `POST /{agent}/invoke` (final answer) and
//! `POST /{agent}/stream` (server-sent events). Whatever an agent emits
//! internally is normalized into a small closed set of wire events
//! (`token`, `tool_start`, `error`, `end`), and every stream ends with
//! exactly one `end` frame.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_relay::prelude::*;
//!
//! # async fn example() -> agent_relay::error::Result<()> {
//! let config = RelayConfig::from_env();
//! let registry = agent_relay::server::build_registry(&config);
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! agent_relay::server::serve(&config, Arc::new(registry), shutdown).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod relay;
pub mod server;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
