//! Proxify - Entry Point
//!
//! Wires the cache, Tor rotator and browser fetcher into the API server and
//! runs it until Ctrl+C or SIGTERM.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proxify::api::ApiServer;
use proxify::browser::{ChromiumFetcher, TracingObserver};
use proxify::config::LogConfig;
use proxify::scrape::{Orchestrator, RetryPolicy};
use proxify::tor::{ExitProbe, TorIdentityRotator};
use proxify::{cache, Config};

#[tokio::main]
async fn main() -> proxify::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);

    info!("Starting Proxify");

    // Connect to cache
    let cache = cache::connect(&config.cache.url).await?;
    info!(backend = cache.backend_name(), "Cache ready");

    let rotator = Arc::new(TorIdentityRotator::new(config.tor.clone()));
    let fetcher = Arc::new(
        ChromiumFetcher::new(config.socks_proxy_url(), config.browser.clone())
            .with_observer(Arc::new(TracingObserver)),
    );

    let mut orchestrator = Orchestrator::new(cache, rotator, fetcher)
        .with_policy(RetryPolicy::from_config(&config.scrape))
        .with_cache_ttl(config.cache_ttl());

    if let Some(url) = &config.scrape.ip_echo_url {
        match ExitProbe::new(&config.tor.socks_host, config.tor.socks_port, url) {
            Ok(probe) => orchestrator = orchestrator.with_exit_probe(probe),
            Err(e) => warn!("Exit address reporting disabled: {}", e),
        }
    }

    if orchestrator.policy().is_unbounded() {
        warn!("SCRAPE_MAX_ATTEMPTS is 0, fetches retry until they succeed");
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let api_server = ApiServer::new(config.api.clone(), Arc::new(orchestrator));
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(shutdown_rx).await {
            error!("API server error: {}", e);
        }
    });

    info!("Server started - API: {}", config.api_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = api_task.await;

    info!("Proxify stopped");
    Ok(())
}

/// Install the global subscriber, honouring `RUST_LOG` over `LOG_LEVEL`
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("proxify={level},tower_http={level}", level = log.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
