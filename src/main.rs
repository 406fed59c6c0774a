//! Interactive chat entry point.
//!
//! Loads settings, builds the stack client and agent registry, and drives a
//! line-oriented conversation against one agent.

use aegis_agent::agent::RespondOptions;
use aegis_agent::config::{GlobalConfig, Settings};
use aegis_agent::knowledge::StackKnowledgeResolver;
use aegis_agent::llm::{Message, StackClient};
use aegis_agent::registry::AgentRegistry;
use anyhow::Context;
use dotenvy::dotenv;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("failed to load settings")?;
    let global = GlobalConfig::load(Path::new(&settings.agent_config_dir))
        .context("failed to load global configuration")?;

    let client = Arc::new(StackClient::new(&settings, global.timeout_secs()));
    let resolver = Arc::new(StackKnowledgeResolver::new(client.clone()));

    let registry = AgentRegistry::from_settings(&settings, client.clone(), client, resolver)
        .await
        .context("failed to build agent registry")?;
    info!(agents = ?registry.names(), "Agent registry ready");

    let agent = registry
        .lookup(settings.default_agent.as_deref().unwrap_or_default())
        .context("no agent available")?;
    println!("Talking to agent '{}' (model '{}'). Empty line quits.", agent.name(), agent.model());

    let mut history: Vec<Message> = Vec::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let options = RespondOptions::default();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        history.push(Message::user(line));
        let reply = agent.respond(&history, &options).await;
        println!("{reply}");
        history.push(Message::assistant(&reply));

        prompt()?;
    }

    Ok(())
}

fn prompt() -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}
