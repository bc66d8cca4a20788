use std::time::{Duration, Instant};

/// Tracks requests made to one host during a crawl run
///
/// Used by the politeness gate to space out requests to the same host.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests started against this host
    pub request_count: u32,

    /// When the most recent request was (or is scheduled to be) started
    pub last_request_time: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates how long to wait before the next request may start
    ///
    /// Returns None if a request can be made at `now`.
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + delay;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Claims the next request slot and returns how long to wait for it
    ///
    /// The slot is recorded immediately, so concurrent callers are spaced out
    /// by `delay` even before any of them has slept.
    pub fn reserve(&mut self, delay: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(delay, now).unwrap_or(Duration::ZERO);
        self.record_request(now + wait);
        wait
    }

    /// Records that a request was started at `at`
    pub fn record_request(&mut self, at: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(at);
    }
}
