//! Page event observers

use tracing::debug;

/// Receives page activity as it happens; every method defaults to a no-op
pub trait PageObserver: Send + Sync {
    fn on_request(&self, _method: &str, _url: &str) {}

    fn on_response(&self, _status: i64, _url: &str) {}

    fn on_console_message(&self, _level: &str, _text: &str) {}
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PageObserver for NoopObserver {}

/// Logs page activity at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PageObserver for TracingObserver {
    fn on_request(&self, method: &str, url: &str) {
        debug!(target: "proxify::page", "Request: {} {}", method, url);
    }

    fn on_response(&self, status: i64, url: &str) {
        debug!(target: "proxify::page", "Response: {} {}", status, url);
    }

    fn on_console_message(&self, level: &str, text: &str) {
        debug!(target: "proxify::page", "Console message: {} - {}", level, text);
    }
}
