//! Page cache keyed by URL
//!
//! Entries are strictly present-and-fresh or absent; expiry is left to the
//! backing store.

mod memory;
mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{ProxifyError, Result};

/// Key-value store for fetched page bodies
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a fresh entry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store an entry; `None` means it never expires
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Open the cache backend selected by the URL scheme
pub async fn connect(url: &str) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = if url.starts_with("memory://") {
        Arc::new(MemoryCache::new())
    } else if url.starts_with("redis://") || url.starts_with("rediss://") {
        Arc::new(RedisCache::new(url).await?)
    } else {
        return Err(ProxifyError::InvalidConfig(format!(
            "unsupported cache URL: {}",
            url
        )));
    };

    info!("Using {} cache", store.backend_name());
    Ok(store)
}
