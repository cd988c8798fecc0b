//! MCP Server entry point for StackWiz
//!
//! Loads configuration from the environment and serves the stack and DNS tools over stdio.
//! The DNS client is created lazily, so a missing API token only affects the DNS tools.

mod prompts;
mod resources;
mod schemas;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use rmcp::ServiceExt;
use server::StackwizMcp;
use stackwiz_core::{ServiceContext, StackwizConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing to stderr (MCP uses stdout for protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    tracing::info!("Starting StackWiz MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let config = StackwizConfig::from_env()?;
    tracing::info!("Configuration: {}", config.masked());

    let ctx = Arc::new(ServiceContext::from_config(config)?);
    match ctx.discover_token().await {
        Ok(token) => tracing::info!("DNS API token available from {}", token.source),
        Err(e) => tracing::warn!("DNS tools unavailable until a token is configured: {e}"),
    }

    let mcp_server = StackwizMcp::new(ctx);
    tracing::info!("MCP server initialized with 9 tools");

    // Start serving via stdio
    tracing::info!("Starting MCP server on stdio transport");
    let service = mcp_server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| anyhow::anyhow!("failed to start MCP server: {e}"))?;

    // Wait for the server to complete
    service.waiting().await?;
    tracing::info!("MCP server stopped");
    Ok(())
}
