//! Router construction and shared handler state.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::services::transfer_service::BulkTransferService;
use crate::storage::{AccountLookup, HealthProbe};

/// State shared with all handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    pub transfers: Arc<dyn BulkTransferService>,
    pub accounts: Arc<dyn AccountLookup>,
    pub health: Arc<dyn HealthProbe>,

    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Public routes (no authentication)
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/transfers",
            post(handlers::transfers::upload_bulk_transfer),
        )
        .route(
            "/api/v1/transfers/json",
            post(handlers::transfers::create_bulk_transfer),
        )
        .route(
            "/api/v1/accounts/{iban}",
            get(handlers::accounts::get_account),
        )
        .route(
            "/api/v1/accounts/{iban}/transfers",
            get(handlers::accounts::list_account_transfers),
        )
        .layer(CorsLayer::permissive())
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
