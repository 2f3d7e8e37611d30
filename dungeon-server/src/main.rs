//! AI Dungeon Master server.
//!
//! Serves a single rolling-memory adventure over HTTP.
//!
//! ```bash
//! GEMINI_KEY=... cargo run -p dungeon-server -- --port 8000
//! ```

use anyhow::Context;
use clap::Parser;
use dungeon_core::GameSession;
use dungeon_server::{build_router, ServerConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    let session = match GameSession::from_env(config.session_config()) {
        Ok(session) => Arc::new(session),
        Err(e) => {
            error!("{e}");
            eprintln!("Please set it in .env file or with: export GEMINI_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    let app = build_router(session, &config.cors_origins);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Dungeon Master listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
