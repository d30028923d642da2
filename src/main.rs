//! nscache - An in-process, namespaced TTL cache
//!
//! Serves the cache management API over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nscache::api::create_router;
use nscache::{AppState, CacheRegistry, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache registry with the configured namespaces
/// 4. Start one background sweeper per namespace
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Flush every namespace on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nscache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting nscache");

    let config = Config::from_env();
    for ns in &config.namespaces {
        info!(
            "Namespace '{}': default_ttl={:?}, sweep_interval={:?}, copy_values={}",
            ns.name, ns.default_ttl, ns.sweep_interval, ns.copy_values
        );
    }

    let registry = Arc::new(CacheRegistry::from_config(&config));
    let sweepers = registry.start_sweepers();
    info!("Cache registry initialized with {} sweepers", sweepers);

    let app = create_router(AppState::new(Arc::clone(&registry)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&registry)))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then flushes the cache
/// so no expiry timer fires against a torn-down process.
async fn shutdown_signal(registry: Arc<CacheRegistry>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
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
                warn!("Failed to install SIGTERM handler: {}", err);
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

    registry.shutdown();
}
