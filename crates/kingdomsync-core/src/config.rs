//! Synchronizer configuration

use std::time::Duration;

/// Default polling cadence of the periodic tick
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default capacity for the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// TCP keepalive used by the HTTP session so idle polls keep their socket
pub const DEFAULT_TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Tunables shared by the synchronizer, the poller and the HTTP session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay between periodic ticks
    pub poll_interval: Duration,
    /// Capacity of the `SyncEvent` broadcast channel
    pub event_capacity: usize,
    /// Per-request timeout; `None` leaves the transport default in place
    pub request_timeout: Option<Duration>,
    /// TCP keepalive for the HTTP client
    pub tcp_keepalive: Duration,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_tcp_keepalive(mut self, keepalive: Duration) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            request_timeout: None,
            tcp_keepalive: DEFAULT_TCP_KEEPALIVE,
        }
    }
}
