//! Polling transport.
//!
//! Fallback for environments where the event stream is unavailable: hits
//! `GET /api/status/{session_id}` on a fixed interval and delivers each
//! response as one `ProgressEvent`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, trace};
use url::Url;

use blunderscope_models::{ProgressEvent, SessionId};

use crate::channel::{AttemptOutcome, EventSink, ProgressTransport};
use crate::error::{ChannelError, Result};

/// Poll-based progress transport.
pub struct PollTransport {
    client: Client,
    base_url: Url,
    poll_interval: Duration,
}

impl PollTransport {
    /// Creates a polling transport against the given service base URL.
    pub fn new(client: Client, base_url: Url, poll_interval: Duration) -> Self {
        Self {
            client,
            base_url,
            poll_interval,
        }
    }

    fn endpoint(&self, session_id: &SessionId) -> Result<Url> {
        Ok(self.base_url.join(&format!("api/status/{}", session_id))?)
    }

    async fn fetch(&self, url: Url) -> Result<ProgressEvent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status));
        }

        response
            .json::<ProgressEvent>()
            .await
            .map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProgressTransport for PollTransport {
    async fn attempt(
        &self,
        session_id: &SessionId,
        sink: &EventSink,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<AttemptOutcome> {
        let url = self.endpoint(session_id)?;
        debug!(
            session_id = %session_id,
            url = %url,
            poll_interval_ms = self.poll_interval.as_millis(),
            "starting status polling"
        );

        let mut ticker = interval(self.poll_interval);

        // Polls until a terminal event, shutdown, or a failed request. A
        // single failed poll aborts the attempt; the channel driver retries
        // after its backoff.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let event = self.fetch(url.clone()).await?;
                    trace!(session_id = %session_id, ?event, "polled status");

                    let terminal = event.is_terminal();
                    if !sink.send(event).await {
                        return Ok(AttemptOutcome::Shutdown);
                    }
                    if terminal {
                        return Ok(AttemptOutcome::Terminal);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(AttemptOutcome::Shutdown);
                    }
                }
            }
        }
    }
}
