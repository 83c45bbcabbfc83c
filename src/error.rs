use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the Proxify application
#[derive(Error, Debug)]
pub enum ProxifyError {
    // Tor errors
    #[error("Tor control error: {0}")]
    TorControl(String),

    #[error("SOCKS connection failed: {0}")]
    SocksConnectionFailed(String),

    // Scrape errors
    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Browser error: {0}")]
    Browser(String),

    // Cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    // Authentication errors
    #[error("Token is missing.")]
    MissingToken,

    #[error("Invalid token. Authentication failed!")]
    InvalidToken,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Operation timed out")]
    Timeout,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Proxify operations
pub type Result<T> = std::result::Result<T, ProxifyError>;

impl ProxifyError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ProxifyError::InvalidRequest(_)
            | ProxifyError::InvalidUrl(_)
            | ProxifyError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            ProxifyError::MissingToken | ProxifyError::InvalidToken => StatusCode::UNAUTHORIZED,

            // 502 Bad Gateway
            ProxifyError::TorControl(_)
            | ProxifyError::SocksConnectionFailed(_)
            | ProxifyError::Browser(_)
            | ProxifyError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            ProxifyError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            ProxifyError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            ProxifyError::Io(_) | ProxifyError::Http(_) | ProxifyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Authorization failures answer in plain text, everything else as JSON.
impl IntoResponse for ProxifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            ProxifyError::MissingToken | ProxifyError::InvalidToken => {
                (status, self.to_string()).into_response()
            }
            _ => {
                let body = json!({
                    "error": self.to_string(),
                });
                (status, Json(body)).into_response()
            }
        }
    }
}

// Convert from hyper errors
impl From<hyper::Error> for ProxifyError {
    fn from(err: hyper::Error) -> Self {
        ProxifyError::Http(err.to_string())
    }
}

// Convert from DevTools protocol errors
impl From<chromiumoxide::error::CdpError> for ProxifyError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ProxifyError::Browser(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for ProxifyError {
    fn from(err: url::ParseError) -> Self {
        ProxifyError::InvalidUrl(err.to_string())
    }
}
