//! Bulk Transfer Service - Main Application Entry Point
//!
//! This is a REST API server that debits an organization's bank account for a
//! batch of outgoing credit transfers. A batch is applied atomically: either
//! every transfer is recorded and the balance debited by the total, or nothing
//! changes.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx, one `SERIALIZABLE` transaction per batch
//! - **Concurrency**: Serialization conflicts are retried with jittered backoff
//! - **Format**: JSON documents, uploaded as multipart files or sent as bodies
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port, draining requests on Ctrl+C or SIGTERM

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
mod services;
mod storage;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::services::transfer_service::TransferService;
use crate::storage::postgres::{PgAccountRepository, PgDatabase, PgTransferRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let database = PgDatabase::new(pool.clone());
    let accounts = PgAccountRepository::new(pool.clone());
    let service = TransferService::new(
        database.clone(),
        accounts.clone(),
        PgTransferRepository::new(),
        config.retry(),
    );

    let shutdown = CancellationToken::new();
    let state = routes::AppState {
        transfers: Arc::new(service),
        accounts: Arc::new(accounts),
        health: Arc::new(database),
        shutdown: shutdown.clone(),
    };
    let app = routes::build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Serve until Ctrl+C or SIGTERM, then stop accepting connections and let in-flight requests finish
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM and cancel every in-flight request's retry wait.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = until_signal("Ctrl+C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = until_signal("SIGTERM", async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    });
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

/// Wait for a signal listener; a listener that cannot be installed never resolves.
async fn until_signal<F>(name: &'static str, listener: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::error!(signal = name, error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
