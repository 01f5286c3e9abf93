#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use ssh_session_mcp::mcp::config::resolve_mcp_port;
use ssh_session_mcp::mcp::{SESSION_REGISTRY, SshSessionTools};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mcp_port = resolve_mcp_port();
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(|_| McpServer::new().tools(SshSessionTools::default())),
        )
        .with(Tracing);

    info!("MCP Server with SSH session support is ready");
    info!("Use ssh_start_session to open a session, ssh_close_session to release it");

    let result = Server::new(TcpListener::bind(mcp_addr))
        .name("SSH Session MCP Server")
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            None,
        )
        .await;

    let closed = SESSION_REGISTRY.close_all().await;
    info!("Closed {} SSH session(s) on shutdown", closed);

    result?;
    Ok(())
}
