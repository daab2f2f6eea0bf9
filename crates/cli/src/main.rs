//! pictoh command line driver.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pictoh_client::{Agent, FetchClient, FetchConfig};
use pictoh_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path.clone())?,
        None => AppConfig::load()?,
    };
    if let Some(db_path) = args.db {
        config.db_path = db_path;
    }

    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config))?;
    let agent = Arc::new(Agent::new(db, Arc::new(network), &config)?);
    let mut out = std::io::stdout();

    match args.command {
        Command::WarmUp { pictures, tts, force } => {
            if !force && !agent.db().is_first_launch().await {
                println!("first-launch warm-up already completed; use --force to run it again");
                return Ok(());
            }
            let pictures = pictures.as_deref().map(commands::read_url_list).transpose()?.unwrap_or_default();
            let tts = tts.as_deref().map(commands::read_url_list).transpose()?.unwrap_or_default();

            start_agent(&agent).await;
            commands::warm_up(agent, pictures, tts, &mut out).await?;
        }
        Command::Fetch { url, method } => {
            start_agent(&agent).await;
            commands::fetch(&agent, &method, &url, &mut out).await?;
        }
        Command::Caches => commands::caches(&agent, &mut out).await?,
        Command::Purge => {
            commands::purge(&agent, &mut out).await?;
        }
        Command::Gc => commands::gc(&agent, &mut out).await?,
    }

    Ok(())
}

/// Install and activate; an agent that fails to install still passes
/// requests through to the network.
async fn start_agent(agent: &Agent) {
    if let Err(e) = agent.start().await {
        tracing::warn!(error = %e, "agent not active, requests bypass the caches");
    }
}
