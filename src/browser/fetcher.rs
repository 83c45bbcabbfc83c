//! Headless Chromium page fetcher
//!
//! Each fetch launches a fresh browser routed through the SOCKS proxy, on a
//! throwaway profile, so a rotated Tor identity always meets the target as a
//! new client with no cookies or storage carried over.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ErrorReason, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::filter::{ResourceFilter, ResourceKind};
use super::idle::{NetworkIdle, DEFAULT_QUIET_PERIOD};
use super::observer::{NoopObserver, PageObserver};
use crate::config::BrowserSettings;
use crate::error::{ProxifyError, Result};

/// Ceiling for a single CDP command, navigation included.
/// Page loads are meant to be unbounded; this only keeps the driver from
/// waiting on a dead browser forever.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-launch Chromium user data directory
#[derive(Debug)]
struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    fn new() -> Self {
        Self {
            path: std::env::temp_dir().join(format!("proxify-profile-{}", Uuid::new_v4())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory once the browser process has exited
    async fn remove(self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed browser profile"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove browser profile: {}", e),
        }
    }
}

/// Retrieves the rendered HTML of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Rendered document body, or `None` on any failure
    async fn fetch(&self, url: &str) -> Option<String>;
}

impl From<&ResourceType> for ResourceKind {
    fn from(value: &ResourceType) -> Self {
        match value {
            ResourceType::Document => ResourceKind::Document,
            ResourceType::Stylesheet => ResourceKind::Stylesheet,
            ResourceType::Image => ResourceKind::Image,
            ResourceType::Font => ResourceKind::Font,
            ResourceType::Script => ResourceKind::Script,
            ResourceType::Media => ResourceKind::Media,
            ResourceType::Xhr | ResourceType::Fetch => ResourceKind::Xhr,
            _ => ResourceKind::Other,
        }
    }
}

/// `PageFetcher` driving headless Chromium over the DevTools protocol
pub struct ChromiumFetcher {
    proxy_url: String,
    settings: BrowserSettings,
    filter: Arc<ResourceFilter>,
    observer: Arc<dyn PageObserver>,
    quiet_period: Duration,
}

impl ChromiumFetcher {
    pub fn new(proxy_url: impl Into<String>, settings: BrowserSettings) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            settings,
            filter: Arc::new(ResourceFilter::default()),
            observer: Arc::new(NoopObserver),
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PageObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .user_data_dir(profile)
            .arg(format!("--proxy-server={}", self.proxy_url));

        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }

        for arg in &self.settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(ProxifyError::Browser)
    }

    /// Run one browser on `profile` for a single page, closing it afterwards
    async fn launch_and_render(&self, profile: &Path, url: &str) -> Result<String> {
        let config = self.browser_config(profile)?;
        let (mut browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let result = self.render(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        handler_task.abort();

        result
    }

    /// Load `url` in a new tab and return its HTML once the network settles
    async fn render(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = browser.new_page("about:blank").await?;
        page.execute(network::EnableParams::default()).await?;

        let idle = Arc::new(NetworkIdle::new());
        let pump = self.spawn_event_pump(&page, idle.clone()).await?;

        page.execute(
            fetch::EnableParams::builder()
                .pattern(RequestPattern::builder().url_pattern("*").build())
                .build(),
        )
        .await?;

        let result = async {
            page.goto(url).await?;
            idle.wait(self.quiet_period).await;
            page.content().await.map_err(ProxifyError::from)
        }
        .await;

        pump.abort();
        result
    }

    /// Route page events to the filter, the idle tracker and the observer
    async fn spawn_event_pump(&self, page: &Page, idle: Arc<NetworkIdle>) -> Result<JoinHandle<()>> {
        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;
        let mut console = page.event_listener::<EventConsoleApiCalled>().await?;

        let page = page.clone();
        let filter = self.filter.clone();
        let observer = self.observer.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = paused.next() => {
                        let kind = ResourceKind::from(&event.resource_type);
                        let outcome = if filter.should_block(&event.request.url, kind) {
                            debug!(url = %event.request.url, ?kind, "Blocking sub-resource");
                            page.execute(FailRequestParams::new(
                                event.request_id.clone(),
                                ErrorReason::BlockedByClient,
                            ))
                            .await
                            .map(|_| ())
                        } else {
                            page.execute(ContinueRequestParams::new(event.request_id.clone()))
                                .await
                                .map(|_| ())
                        };
                        if let Err(e) = outcome {
                            debug!("Interception reply failed: {}", e);
                        }
                    }
                    Some(event) = requests.next() => {
                        idle.request_started(event.request_id.inner());
                        observer.on_request(&event.request.method, &event.request.url);
                    }
                    Some(event) = responses.next() => {
                        observer.on_response(event.response.status, &event.response.url);
                    }
                    Some(event) = finished.next() => {
                        idle.request_finished(event.request_id.inner());
                    }
                    Some(event) = failed.next() => {
                        idle.request_finished(event.request_id.inner());
                    }
                    Some(event) = console.next() => {
                        let level = format!("{:?}", event.r#type).to_lowercase();
                        observer.on_console_message(&level, &console_text(&event.args));
                    }
                    else => break,
                }
            }
        }))
    }
}

fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .filter_map(|arg| match &arg.value {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => arg.description.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Option<String> {
        let profile = ProfileDir::new();
        let result = self.launch_and_render(profile.path(), url).await;
        profile.remove().await;

        match result {
            Ok(html) => {
                info!(bytes = html.len(), "Page rendered");
                Some(html)
            }
            Err(e) => {
                error!("An error occurred while fetching {}: {}", url, e);
                None
            }
        }
    }
}
