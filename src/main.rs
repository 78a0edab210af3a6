//! Live Feed - real-time notification layer for a post feed
//!
//! Serves the post API and the live event stream.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::{signal, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_feed::{create_router, AppState, Config};

/// Main entry point for the Live Feed server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build shared state (cache, broadcaster, auth, post storage)
/// 4. Start HTTP server on configured port
/// 5. On SIGINT/SIGTERM, stop every open event stream and drain
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_feed=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Live Feed server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, heartbeat={:?} after {:?} idle, token_ttl={}s, permission_ttl={}s",
        config.server_port,
        config.heartbeat().tick,
        config.heartbeat().idle_window(),
        config.token_cache_ttl,
        config.permission_cache_ttl
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::from_config(&config, shutdown_rx);
    if config.auth_tokens.is_empty() {
        warn!("AUTH_TOKENS is empty; every authenticated route will answer 401");
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then tells every pump
/// loop to stop so open event streams end and the server can drain.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Receivers live in the state; a send error only means none remain
    let _ = shutdown_tx.send(true);
    info!("Event streams signalled to close");
}
