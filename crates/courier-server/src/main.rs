//! # courier-server
//!
//! HTTP and WebSocket front end for the courier messaging engine.
//!
//! This binary provides:
//! - **REST API** (axum) for direct chats, groups, memberships and messages
//! - **Live Directory** and **Live Conversation** WebSocket sessions
//! - **Bearer-token authentication** (HS256 JWT) resolving every request to
//!   a principal
//!
//! State lives in a single SQLite database (`courier-store`).

mod api;
mod auth;
mod config;
mod error;
mod ws;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_core::Messaging;
use courier_store::Database;

use crate::api::AppState;
use crate::auth::TokenVerifier;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_server=debug")),
        )
        .init();

    info!("Starting courier server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage and wire the engine
    // -----------------------------------------------------------------------
    let db = Arc::new(Database::open_at(&config.database_path)?);
    let tokens = Arc::new(TokenVerifier::new(&config.token_secret));

    let http_addr = config.http_addr;
    let app_state = AppState {
        messaging: Messaging::new(db),
        tokens,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
