//! Scrape workflow: cache, retry-on-block, cache population

pub mod block;
pub mod orchestrator;

pub use block::{classify, is_blocked};
pub use orchestrator::{Orchestrator, RetryPolicy, DEFAULT_CACHE_TTL};
