//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that build the
//! knowledge engine and wire it into a running server. When
//! `storage.autosave` is set, the graph is written back to the snapshot on
//! shutdown.

use anyhow::Result;
use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::engine::ContextEngine;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::CakeTools;

/// Shared setup: warm-start the engine from the snapshot and configured sources.
fn setup_shared_state(config: &CakeConfig) -> Result<Arc<ContextEngine>> {
    let engine = bootstrap::build_engine(config)?;
    tracing::info!(
        snapshot = %config.resolved_snapshot_path().display(),
        "knowledge graph ready"
    );
    Ok(Arc::new(engine))
}

/// Save the graph on shutdown if autosave is enabled.
fn shutdown(engine: &ContextEngine, config: &CakeConfig) -> Result<()> {
    if config.storage.autosave {
        bootstrap::save_snapshot(engine, config)?;
    }
    Ok(())
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CakeConfig) -> Result<()> {
    tracing::info!("starting CAKE MCP server on stdio");

    let engine = setup_shared_state(&config)?;

    let tools = CakeTools::new(Arc::clone(&engine));
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    shutdown(&engine, &config)
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: CakeConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting CAKE MCP server on HTTP");

    let engine = setup_shared_state(&config)?;

    let shared = Arc::clone(&engine);
    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(CakeTools::new(shared.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    shutdown(&engine, &config)
}
