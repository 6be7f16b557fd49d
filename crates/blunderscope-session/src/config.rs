//! Controller configuration.

use std::time::Duration;

use url::Url;

use blunderscope_channel::ChannelConfig;

/// Configuration for the session controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base URL of the analysis service.
    pub base_url: Url,
    /// Progress channel settings (transport, backoff, poll cadence).
    pub channel: ChannelConfig,
    /// Pause between completion and marking results visible, so the 100%
    /// state is perceptible.
    pub results_reveal_delay: Duration,
    /// Buffer size of the event queue between channel and controller.
    pub event_buffer: usize,
}

impl ControllerConfig {
    /// Creates a config for the given service base URL with defaults.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            channel: ChannelConfig::default(),
            results_reveal_delay: Duration::from_millis(600),
            event_buffer: 256,
        }
    }

    /// Sets the channel configuration.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the results-reveal delay.
    pub fn with_results_reveal_delay(mut self, delay: Duration) -> Self {
        self.results_reveal_delay = delay;
        self
    }

    /// Sets the event queue buffer size.
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }
}
