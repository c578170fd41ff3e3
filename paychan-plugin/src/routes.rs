//! Inbound route configuration.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use paychan_core::constants::{DATA_PATH, IDENTITY_PATH, MONEY_PATH};

use crate::handlers;
use crate::state::AppState;

/// Creates the inbound router with all routes configured.
pub fn create_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(IDENTITY_PATH, get(handlers::identity))
        .route(MONEY_PATH, post(handlers::accept_money))
        .route(DATA_PATH, post(handlers::accept_data))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
