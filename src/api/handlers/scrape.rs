//! Scrape endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use crate::api::server::AppState;
use crate::error::{ProxifyError, Result};
use crate::models::ScrapeRequest;

const MISSING_URL: &str = "Missing URL in the request body";

/// Fetch a page (cached or live) for the URL in the body
pub async fn scrape(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Unreadable scrape body: {}", rejection);
            ScrapeRequest::default()
        }
    };

    let url = request
        .url()
        .ok_or_else(|| ProxifyError::InvalidRequest(MISSING_URL.into()))?;

    let result = state.orchestrator.scrape(url).await?;

    Ok((StatusCode::OK, Json(result)))
}
