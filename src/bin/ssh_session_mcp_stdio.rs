#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use ssh_session_mcp::mcp::{SESSION_REGISTRY, SshSessionTools};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let result = poem_mcpserver::stdio::stdio(McpServer::new().tools(SshSessionTools::default())).await;

    let closed = SESSION_REGISTRY.close_all().await;
    info!("Closed {} SSH session(s) on shutdown", closed);

    result?;
    Ok(())
}
