//! pictoh-agent entry point.
//!
//! Boots the offline agent and serves the JSON-lines message protocol on
//! stdio. Logging goes to stderr so stdout carries only protocol lines.

use std::sync::Arc;

use anyhow::{Context, Result};
use pictoh_client::{Agent, FetchClient, FetchConfig};
use pictoh_core::{AppConfig, CacheDb};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

mod error;
mod host;
mod protocol;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(db = %config.db_path.display(), origin = %config.origin, version = %config.cache_version, "starting pictoh-agent on stdio");

    let db = CacheDb::open(&config.db_path).await.context("opening cache store")?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config))?;
    let agent = Arc::new(Agent::new(db, Arc::new(network), &config)?);

    // A failed install leaves the agent redundant; requests still pass through.
    if let Err(e) = agent.start().await {
        tracing::error!(error = %e, "agent did not activate");
    }

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let host = Arc::new(host::Host::spawn(agent, out_tx));
    host.announce().await;

    let mut in_flight = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let host = host.clone();
        in_flight.spawn(async move { host.handle_line(&line).await });
        while in_flight.try_join_next().is_some() {}
    }

    tracing::info!(pending = in_flight.len(), "stdin closed, finishing in-flight messages");
    while in_flight.join_next().await.is_some() {}

    match Arc::try_unwrap(host) {
        Ok(host) => host.shutdown().await,
        Err(_) => {
            tracing::warn!("host still referenced at shutdown");
            return Ok(());
        }
    }

    writer.await??;
    Ok(())
}
