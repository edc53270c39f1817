//! fsgate - Filesystem MCP Server
//!
//! Serves read/write/list/tree tools over stdio, confined to the directories
//! listed in `ALLOWED_PATHS`. Stdout carries protocol frames only; all logging
//! goes to stderr.

use anyhow::Context;
use fsgate_core::{McpServer, ServerConfig, Transport};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        error!("Failed to start server: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting filesystem MCP server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env().context("invalid configuration")?;

    info!("Allowed paths:");
    for dir in config.registry.entries() {
        info!("  {} ({})", dir.canonical_path.display(), dir.permission);
    }
    info!("Size limit: {}", config.size_limit);

    let server = McpServer::from_config(config);
    server
        .run(Transport::stdio())
        .await
        .context("server terminated")?;

    Ok(())
}
