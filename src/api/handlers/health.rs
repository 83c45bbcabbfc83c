//! Liveness endpoint

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;

/// Report liveness plus the cache backend and retry bound in use
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let policy = state.orchestrator.policy();

    Json(json!({
        "status": "healthy",
        "service": "proxify",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.orchestrator.cache_backend(),
        "max_attempts": policy.max_attempts,
    }))
}
