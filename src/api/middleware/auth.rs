//! Bearer token guard
//!
//! Applied as a route layer in front of protected handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::{ProxifyError, Result};

/// Static bearer token check
#[derive(Clone)]
pub struct BearerAuth {
    token: Arc<str>,
}

impl BearerAuth {
    pub fn new(token: &str) -> Self {
        Self {
            token: Arc::from(token),
        }
    }

    /// Extract token from Authorization header
    pub fn extract_token(authorization: &str) -> Option<&str> {
        authorization
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Validate the raw Authorization header value
    pub fn validate(&self, authorization: Option<&str>) -> Result<()> {
        let authorization = authorization.ok_or(ProxifyError::MissingToken)?;
        let token = Self::extract_token(authorization).ok_or(ProxifyError::InvalidToken)?;

        if token == &*self.token {
            Ok(())
        } else {
            Err(ProxifyError::InvalidToken)
        }
    }
}

/// Reject requests without the configured bearer token
pub async fn require_bearer(
    State(auth): State<BearerAuth>,
    req: Request<Body>,
    next: Next,
) -> Result<Response> {
    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| ProxifyError::InvalidToken)?),
        None => None,
    };

    if let Err(e) = auth.validate(header_value) {
        warn!(uri = %req.uri(), "Rejected request: {}", e);
        return Err(e);
    }

    debug!("Bearer token accepted");
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token() {
        assert_eq!(BearerAuth::extract_token("Bearer abc123"), Some("abc123"));
        assert_eq!(BearerAuth::extract_token("Bearer "), None);
        assert_eq!(BearerAuth::extract_token("Basic abc123"), None);
        assert_eq!(BearerAuth::extract_token("abc123"), None);
    }

    #[test]
    fn test_validate() {
        let auth = BearerAuth::new("abc");

        assert!(auth.validate(Some("Bearer abc")).is_ok());
        assert!(matches!(auth.validate(None), Err(ProxifyError::MissingToken)));
        assert!(matches!(
            auth.validate(Some("Bearer wrong")),
            Err(ProxifyError::InvalidToken)
        ));
        assert!(matches!(
            auth.validate(Some("abc")),
            Err(ProxifyError::InvalidToken)
        ));
    }
}
