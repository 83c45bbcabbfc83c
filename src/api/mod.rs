//! API server implementation
//!
//! Provides the authenticated scrape endpoint.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
