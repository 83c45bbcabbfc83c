//! Headless browser page retrieval
//!
//! This module provides:
//! - the `PageFetcher` seam and its Chromium implementation
//! - sub-resource blocking by type and file extension
//! - network idle detection
//! - page event observers

pub mod fetcher;
pub mod filter;
pub mod idle;
pub mod observer;

pub use fetcher::{ChromiumFetcher, PageFetcher};
pub use filter::{ResourceFilter, ResourceKind};
pub use idle::NetworkIdle;
pub use observer::{NoopObserver, PageObserver, TracingObserver};
