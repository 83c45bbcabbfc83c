//! Proxify - Scraping gateway over Tor
//!
//! Fetches fully rendered pages through Tor, rotating the exit identity
//! before every attempt and retrying when the target answers with a block
//! page.
//!
//! ## Features
//!
//! - Headless Chromium rendering with static resource filtering
//! - Tor identity rotation over the control port (`SIGNAL NEWNYM`)
//! - Bounded retry on failed or blocked fetches
//! - Redis (or in-memory) page cache with a 48 hour TTL
//! - Bearer-token protected `POST /scrape` endpoint

pub mod api;
pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod scrape;
pub mod tor;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ProxifyError, Result};
