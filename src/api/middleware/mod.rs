//! API middleware

mod auth;
mod logging;

pub use auth::{require_bearer, BearerAuth};
pub use logging::RequestLogging;
