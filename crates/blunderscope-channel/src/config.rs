//! Channel configuration.

use std::time::Duration;

/// Which delivery mechanism the channel uses.
///
/// Both are implementations of the same `ProgressTransport` contract; the
/// choice is configuration, not a divergent code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Server-sent events over `GET /api/progress/{session_id}`.
    #[default]
    Sse,
    /// Fixed-interval polling of `GET /api/status/{session_id}`.
    Poll,
}

/// Configuration for the progress channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Delivery mechanism.
    pub transport: TransportKind,
    /// Backoff between delivery attempts after a transient failure.
    pub retry_delay: Duration,
    /// Poll cadence for the polling transport.
    pub poll_interval: Duration,
    /// Consecutive-failure bound before the channel gives up with a
    /// synthetic terminal error. `None` retries indefinitely.
    pub max_retries: Option<u32>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Sse,
            retry_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
            max_retries: None,
        }
    }
}

impl ChannelConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery mechanism.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the retry backoff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the poll cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds consecutive failed attempts.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}
