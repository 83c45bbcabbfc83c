//! Retrieval orchestration
//!
//! Cache lookup first; on a miss, rotate identity and fetch until a usable
//! body arrives or the retry policy gives up, then populate the cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::block::classify;
use crate::browser::PageFetcher;
use crate::cache::CacheStore;
use crate::config::ScrapeConfig;
use crate::error::{ProxifyError, Result};
use crate::models::{AttemptOutcome, FetchResult};
use crate::tor::{ExitProbe, IdentityRotator};

/// Expiry applied to freshly fetched pages (48 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// How long and how hard to keep trying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up; 0 retries forever
    pub max_attempts: u32,
    /// Pause after a block page
    pub block_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            block_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            block_delay: Duration::from_millis(config.block_delay_ms),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    fn is_exhausted(&self, attempts: u32) -> bool {
        !self.is_unbounded() && attempts >= self.max_attempts
    }
}

/// Coordinates cache, identity rotation and page fetching for one URL
pub struct Orchestrator {
    cache: Arc<dyn CacheStore>,
    rotator: Arc<dyn IdentityRotator>,
    fetcher: Arc<dyn PageFetcher>,
    exit_probe: Option<Arc<ExitProbe>>,
    policy: RetryPolicy,
    cache_ttl: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        rotator: Arc<dyn IdentityRotator>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            cache,
            rotator,
            fetcher,
            exit_probe: None,
            policy: RetryPolicy::default(),
            cache_ttl: Some(DEFAULT_CACHE_TTL),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_exit_probe(mut self, probe: ExitProbe) -> Self {
        self.exit_probe = Some(Arc::new(probe));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Serve `url` from cache or fetch it through a fresh identity
    #[instrument(skip(self), fields(scrape_id = %Uuid::new_v4()))]
    pub async fn scrape(&self, url: &str) -> Result<FetchResult> {
        match self.cache.get(url).await {
            Ok(Some(body)) => {
                let result = FetchResult::new(url, Some(body));
                info!(size_kb = result.size_kb(), "Getting data from cache");
                return Ok(result);
            }
            Ok(None) => debug!("Cache miss"),
            Err(e) => warn!("Cache lookup failed, treating as miss: {}", e),
        }

        let body = self.fetch_with_retry(url).await?;

        self.report_exit_address().await;

        if let Err(e) = self.cache.set(url, &body, self.cache_ttl).await {
            warn!("Failed to cache page: {}", e);
        }

        let result = FetchResult::new(url, Some(body));
        info!(size_kb = result.size_kb(), "Getting data from {}", url);
        Ok(result)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            // Control-port failures end the request.
            self.rotator.rotate().await?;

            let outcome = classify(self.fetcher.fetch(url).await);
            debug!(attempt = attempts, outcome = outcome.as_str(), "Fetch attempt finished");

            let outcome = match outcome {
                AttemptOutcome::Success(body) => return Ok(body),
                retry => retry,
            };

            if self.policy.is_exhausted(attempts) {
                error!(attempts, outcome = outcome.as_str(), "Giving up on {}", url);
                return Err(ProxifyError::RetriesExhausted { attempts });
            }

            match outcome {
                AttemptOutcome::Blocked => {
                    warn!(attempt = attempts, "403 Forbidden response received, retrying");
                    tokio::time::sleep(self.policy.block_delay).await;
                }
                _ => warn!(attempt = attempts, "Failed to get data from the website, retrying"),
            }
        }
    }

    async fn report_exit_address(&self) {
        let Some(probe) = &self.exit_probe else {
            return;
        };

        match probe.exit_address().await {
            Ok(address) => info!("Proxified ip: {}", address),
            Err(e) => debug!("Exit address probe failed: {}", e),
        }
    }
}
