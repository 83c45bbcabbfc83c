//! Per-request access log

use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Access log emitted once per request
pub struct RequestLogging;

impl RequestLogging {
    /// Record method, path, status and latency. Failed scrapes log at warn.
    pub async fn log_request(req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        let response = next.run(req).await;

        let status = response.status().as_u16();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if response.status().is_server_error() {
            warn!(%method, %path, status, elapsed_ms, "request failed");
        } else {
            info!(%method, %path, status, elapsed_ms, "request handled");
        }

        response
    }
}
