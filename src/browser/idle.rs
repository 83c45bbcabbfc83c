//! Network idle detection
//!
//! The page counts as idle once no request has been in flight for the quiet
//! period.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Quiet period used when waiting for a page to settle
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct State {
    inflight: HashSet<String>,
    last_change: Instant,
}

/// Tracks in-flight requests by id
#[derive(Debug)]
pub struct NetworkIdle {
    state: Mutex<State>,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkIdle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                inflight: HashSet::new(),
                last_change: Instant::now(),
            }),
        }
    }

    pub fn request_started(&self, id: &str) {
        let mut state = self.state.lock();
        state.inflight.insert(id.to_string());
        state.last_change = Instant::now();
    }

    pub fn request_finished(&self, id: &str) {
        let mut state = self.state.lock();
        if state.inflight.remove(id) {
            state.last_change = Instant::now();
        }
    }

    /// Idle as of `now`
    pub fn is_idle_at(&self, now: Instant, quiet: Duration) -> bool {
        let state = self.state.lock();
        state.inflight.is_empty() && now.saturating_duration_since(state.last_change) >= quiet
    }

    /// Resolve once the network has been quiet for `quiet`; never times out
    pub async fn wait(&self, quiet: Duration) {
        while !self.is_idle_at(Instant::now(), quiet) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
