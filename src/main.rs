//! agent-relay binary entry point.

use agent_relay::cli::{chat, handle_serve, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Chat(args) => chat::handle_chat(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
