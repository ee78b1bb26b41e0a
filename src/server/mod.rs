//! HTTP transport for the condition pool
//!
//! Routes:
//! - `GET|POST /api/assignments/select` - lease a condition
//! - `POST /api/assignments/close` - release a lease (fire-and-forget)
//! - `POST /api/sessions` - store a finished session payload
//! - `GET /api/pool/status`, `GET /api/pool/leased` - operator views
//! - `GET /content/problems.json` - problem bank
//! - `GET /health`

pub mod api;
pub mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::store::LeaseStore;

/// State shared across handlers
pub struct AppState {
    pub store: Arc<LeaseStore>,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<LeaseStore>, config: Config) -> SharedState {
        Arc::new(Self { store, config })
    }
}

/// Create the API router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/api/assignments/select",
            get(routes::select_assignment).post(routes::select_assignment),
        )
        .route("/api/assignments/close", post(routes::close_assignment))
        .route("/api/sessions", post(routes::submit_session))
        .route("/api/pool/status", get(routes::pool_status))
        .route("/api/pool/leased", get(routes::pool_leased))
        .route("/content/problems.json", get(routes::problem_bank))
        .route("/health", get(routes::health))
        .with_state(state)
}

/// Serve the API on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: SharedState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Lease API listening on http://{}", addr);
    }
    axum::serve(listener, create_router(state)).await
}
