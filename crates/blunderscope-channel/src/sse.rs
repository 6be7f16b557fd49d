//! Server-sent-events transport.
//!
//! Streams `GET /api/progress/{session_id}` and decodes each SSE frame's
//! `data:` payload as one `ProgressEvent`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, trace, warn};
use url::Url;

use blunderscope_models::{ProgressEvent, SessionId};

use crate::channel::{AttemptOutcome, EventSink, ProgressTransport};
use crate::error::{ChannelError, Result};

/// Incremental SSE frame decoder.
///
/// Frames may arrive split across arbitrary chunk boundaries; bytes are
/// buffered until a blank-line delimiter completes a frame. Comment lines
/// and non-`data:` fields are dropped; multi-line data is joined.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feeds one chunk and returns the data payloads of every frame it
    /// completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame: Vec<u8> = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(data) = frame_data(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }
}

/// Position and length of the earliest blank-line frame delimiter.
fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n");
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");

    match (lf, crlf) {
        (Some(l), Some(c)) if c < l => Some((c, 4)),
        (Some(l), _) => Some((l, 2)),
        (None, Some(c)) => Some((c, 4)),
        (None, None) => None,
    }
}

fn frame_data(frame: &[u8]) -> Option<String> {
    if frame.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(frame);
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Parses one SSE data payload into a progress event.
///
/// Malformed payloads are logged and skipped rather than breaking the
/// stream.
fn decode_payload(session_id: &SessionId, payload: &str) -> Option<ProgressEvent> {
    if payload.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ProgressEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                session_id = %session_id,
                error = %e,
                "skipping malformed progress payload"
            );
            None
        }
    }
}

/// Push-based progress transport over server-sent events.
pub struct SseTransport {
    client: Client,
    base_url: Url,
}

impl SseTransport {
    /// Creates an SSE transport against the given service base URL.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, session_id: &SessionId) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("api/progress/{}", session_id))?)
    }
}

#[async_trait]
impl ProgressTransport for SseTransport {
    async fn attempt(
        &self,
        session_id: &SessionId,
        sink: &EventSink,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<AttemptOutcome> {
        let url = self.endpoint(session_id)?;
        debug!(session_id = %session_id, url = %url, "opening event stream");

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

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for payload in decoder.push_chunk(&bytes) {
                            let Some(event) = decode_payload(session_id, &payload) else {
                                continue;
                            };
                            trace!(session_id = %session_id, ?event, "decoded event");
                            let terminal = event.is_terminal();
                            if !sink.send(event).await {
                                // Receiver gone; the session was torn down.
                                return Ok(AttemptOutcome::Shutdown);
                            }
                            if terminal {
                                return Ok(AttemptOutcome::Terminal);
                            }
                        }
                    }
                    Some(Err(e)) => return Err(ChannelError::Stream(e.to_string())),
                    None => {
                        debug!(session_id = %session_id, "event stream ended");
                        return Ok(AttemptOutcome::Ended);
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(AttemptOutcome::Shutdown);
                    }
                }
            }
        }
    }
}
