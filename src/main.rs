//! Movie Catalog - REST backend
//! Mission: Serve the movie catalog and its account system over HTTP

use anyhow::{Context, Result};
use movie_catalog_backend::{build_router, config::load_env, error, AppState, Config};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        env = ?config.app_env,
        database = %config.database_path,
        "🚀 Movie catalog starting"
    );

    error::set_expose_internal_errors(!config.is_production());

    let listen_addr = config.listen_addr();
    let state = AppState::from_config(config)?;

    match state.movies.count() {
        Ok(count) => info!("🎬 Movies in catalog: {}", count),
        Err(e) => warn!("Could not count movies: {:#}", e),
    }

    // Keep the rate limiter's table bounded
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut ticker = interval(limiter.config().window);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });

    let app = build_router(state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("🎯 API server listening on {}", listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received, draining connections");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_catalog_backend=debug,movie_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
