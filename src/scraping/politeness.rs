//! Per-host politeness delay
//!
//! Consulted by the fetch layer before every request. Each host gets its own
//! start slot; the limiter's lock only guards the timestamp map, never the
//! wait itself, so requests to unrelated hosts do not queue behind each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::url_filter;

/// Decision about when a request may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    /// Request may start now
    Allowed,
    /// Request must wait for the specified duration
    WaitFor(Duration),
}

impl FetchDecision {
    /// Time left to wait
    pub fn delay(&self) -> Duration {
        match self {
            Self::Allowed => Duration::ZERO,
            Self::WaitFor(d) => *d,
        }
    }
}

/// Enforces a minimum interval between request starts to the same host
#[derive(Debug)]
pub struct PolitenessLimiter {
    min_delay: Duration,
    /// Host -> start time of its last (possibly still pending) request
    last_visit: Mutex<HashMap<String, Instant>>,
}

impl PolitenessLimiter {
    /// Create a limiter with the given per-host delay
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_visit: Mutex::new(HashMap::new()),
        }
    }

    /// Configured per-host delay
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Reserve the next start slot for `host`.
    ///
    /// The slot is `max(now, last + min_delay)` and is recorded before the lock
    /// is released, so concurrent callers for one host line up one delay apart.
    pub fn reserve(&self, host: &str) -> FetchDecision {
        let host = host.to_lowercase();
        let mut last_visit = self.last_visit.lock();
        let now = Instant::now();

        let start = match last_visit.get(&host) {
            Some(last) => (*last + self.min_delay).max(now),
            None => now,
        };
        last_visit.insert(host, start);

        if start > now {
            FetchDecision::WaitFor(start - now)
        } else {
            FetchDecision::Allowed
        }
    }

    /// Reserve a slot for the `host[:port]` of `url`; URLs without a host are not delayed
    pub fn reserve_url(&self, url: &str) -> FetchDecision {
        match url_filter::parse(url).and_then(|parsed| url_filter::authority_of(&parsed)) {
            Ok(host) => self.reserve(&host),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "no host to rate limit");
                FetchDecision::Allowed
            }
        }
    }

    /// Wait until a request to `url` may start
    pub async fn wait_before_request(&self, url: &str) {
        let delay = self.reserve_url(url).delay();
        if !delay.is_zero() {
            tracing::trace!(url = %url, ?delay, "politeness delay");
            tokio::time::sleep(delay).await;
        }
    }

    /// Blocking variant of `wait_before_request` for worker threads
    pub fn wait_before_request_blocking(&self, url: &str) {
        let delay = self.reserve_url(url).delay();
        if !delay.is_zero() {
            tracing::trace!(url = %url, ?delay, "politeness delay");
            std::thread::sleep(delay);
        }
    }

    /// Number of hosts seen so far
    pub fn tracked_hosts(&self) -> usize {
        self.last_visit.lock().len()
    }
}
