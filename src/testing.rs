//! Test doubles for the orchestrator's collaborators

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::browser::PageFetcher;
use crate::cache::CacheStore;
use crate::error::{ProxifyError, Result};
use crate::tor::IdentityRotator;

/// Rotator that only counts calls
#[derive(Default)]
pub struct CountingRotator {
    calls: AtomicUsize,
}

impl CountingRotator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityRotator for CountingRotator {
    async fn rotate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Rotator whose control port always refuses
pub struct FailingRotator;

#[async_trait]
impl IdentityRotator for FailingRotator {
    async fn rotate(&self) -> Result<()> {
        Err(ProxifyError::TorControl("connection refused".into()))
    }
}

/// Fetcher that replays a script, then returns `None` forever
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Option<&str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|body| body.map(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns `None`
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give timers a chance to fire in tight retry loops.
        tokio::task::yield_now().await;

        self.script.lock().pop_front().flatten()
    }
}

/// Fetcher for paths that must never reach the network
pub struct UnreachableFetcher;

#[async_trait]
impl PageFetcher for UnreachableFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        panic!("fetcher called for {}", url);
    }
}

/// Cache whose backend is down
pub struct BrokenCache;

#[async_trait]
impl CacheStore for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(ProxifyError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "cache down",
        )))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<()> {
        Err(ProxifyError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "cache down",
        )))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

/// In-memory sink for formatted log output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route warn-and-above events on the current thread into a buffer
pub fn capture_warnings() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(Level::WARN)
        .finish();

    (buffer, tracing::subscriber::set_default(subscriber))
}
