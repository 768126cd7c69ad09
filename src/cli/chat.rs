//! Interactive console for `agent-relay chat`.

use std::io::Write;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use uuid::Uuid;

use super::ChatArgs;
use crate::client::AgentClient;
use crate::error::Result;
use crate::relay::WireEvent;

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    Switch(String),
    Blank,
    Message(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Self::Quit;
        }
        match line.strip_prefix("/switch") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                Self::Switch(rest.trim().to_string())
            }
            _ => Self::Message(line.to_string()),
        }
    }
}

/// Read prompts from stdin and stream each answer to stdout.
pub async fn handle_chat(args: ChatArgs) -> Result<()> {
    let client = AgentClient::new(&args.url);
    let thread_id = args.thread.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut agent = args.agent;

    let available = client.agents().await?;
    eprintln!("Connected to {} (agents: {})", client.base_url(), available.join(", "));
    eprintln!("Talking to '{agent}' on thread {thread_id}. Type /switch <agent> or quit.");

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        print!("{agent}> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next().await else { break };

        match ChatCommand::parse(&line?) {
            ChatCommand::Quit => break,
            ChatCommand::Blank => continue,
            ChatCommand::Switch(name) if name.is_empty() => {
                eprintln!("Usage: /switch <agent>");
            }
            ChatCommand::Switch(name) => {
                if available.contains(&name) {
                    eprintln!("Switched to '{name}'.");
                    agent = name;
                } else {
                    eprintln!("Unknown agent '{name}'. Available: {}", available.join(", "));
                }
            }
            ChatCommand::Message(message) => {
                match client.stream(&agent, &message, Some(&thread_id), true).await {
                    Ok(mut events) => {
                        while let Some(event) = events.next().await {
                            render(&event);
                        }
                    }
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
        }
    }
    Ok(())
}

fn render(event: &WireEvent) {
    match event {
        WireEvent::Token { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        WireEvent::ToolStart { name, input } => eprintln!("\n[tool] {name} {input}"),
        WireEvent::Error { content } => eprintln!("\n[error] {content}"),
        WireEvent::End => println!(),
    }
}
