//! API route definitions

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::middleware::require_bearer;
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no auth required)
        .route("/health", get(handlers::health::health_check))
        // Protected routes
        .merge(protected_routes(&state))
        .with_state(state)
}

/// Routes that require the bearer token
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/scrape", post(handlers::scrape::scrape))
        .route_layer(from_fn_with_state(state.auth.clone(), require_bearer))
}
