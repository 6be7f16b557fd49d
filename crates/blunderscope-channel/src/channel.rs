//! The progress channel: one background delivery task per session.
//!
//! A `ProgressChannel` owns the task that drives a `ProgressTransport`,
//! retrying transient failures with a fixed backoff and stopping cleanly on
//! terminal events, shutdown, or an exhausted retry bound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use blunderscope_models::{ProgressEvent, SessionId};

use crate::config::{ChannelConfig, TransportKind};
use crate::error::Result;
use crate::poll::PollTransport;
use crate::sse::SseTransport;

/// Message shown when the retry bound is exhausted.
const CONNECTION_LOST_MESSAGE: &str = "Lost connection to the analysis service";

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A terminal event was delivered; the channel is done.
    Terminal,
    /// The stream ended without a terminal event; reconnect after backoff.
    Ended,
    /// Shutdown was signalled or the consumer went away.
    Shutdown,
}

/// Ordered event sink handed to transports.
///
/// Wraps the controller-facing `mpsc` sender and counts deliveries so the
/// channel driver can reset its consecutive-failure counter whenever an
/// attempt made progress before failing.
pub struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
    shutdown: watch::Receiver<bool>,
    delivered: AtomicU64,
}

impl EventSink {
    /// Wraps an `mpsc` sender. `shutdown` is the channel's shutdown signal;
    /// a send blocked on a full queue aborts when it fires, so `close()`
    /// can always join the delivery task.
    pub fn new(tx: mpsc::Sender<ProgressEvent>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            tx,
            shutdown,
            delivered: AtomicU64::new(0),
        }
    }

    /// Delivers one event in arrival order.
    ///
    /// Returns false when the receiving side is gone (session torn down)
    /// or shutdown was signalled while the queue was full.
    pub async fn send(&self, event: ProgressEvent) -> bool {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            sent = self.tx.send(event) => {
                if sent.is_err() {
                    return false;
                }
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            // A dropped shutdown sender counts as shutdown too.
            _ = shutdown.wait_for(|stop| *stop) => false,
        }
    }

    /// Total events delivered through this sink.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

/// One delivery mechanism for progress events.
///
/// Implementations run a single attempt: connect (or poll), push decoded
/// events into the sink in arrival order, and report how the attempt ended.
/// Exactly-once delivery of the terminal event is not guaranteed across
/// attempts; the consumer must be idempotent on terminal states.
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    /// Runs one delivery attempt for the session.
    async fn attempt(
        &self,
        session_id: &SessionId,
        sink: &EventSink,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<AttemptOutcome>;
}

/// Builds the configured transport against a service base URL.
pub fn build_transport(
    client: &Client,
    base_url: &Url,
    config: &ChannelConfig,
) -> Arc<dyn ProgressTransport> {
    match config.transport {
        TransportKind::Sse => Arc::new(SseTransport::new(client.clone(), base_url.clone())),
        TransportKind::Poll => Arc::new(PollTransport::new(
            client.clone(),
            base_url.clone(),
            config.poll_interval,
        )),
    }
}

/// Handle to the delivery task for one session.
pub struct ProgressChannel {
    session_id: SessionId,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressChannel {
    /// Opens the channel: spawns the delivery task for `session_id`.
    ///
    /// At most one channel may be open at a time; the caller enforces that
    /// by closing any previous channel first.
    pub fn open(
        transport: Arc<dyn ProgressTransport>,
        config: ChannelConfig,
        session_id: SessionId,
        tx: mpsc::Sender<ProgressEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task_session = session_id.clone();
        let sink = EventSink::new(tx, shutdown_rx.clone());

        let handle = tokio::spawn(async move {
            drive(transport, config, task_session, sink, shutdown_rx).await;
        });

        Self {
            session_id,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// The session this channel delivers for.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns true while the delivery task is still running.
    pub fn is_open(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Closes the channel: signals shutdown and joins the delivery task.
    ///
    /// Safe to call multiple times and from either success or failure
    /// paths; after the first call there is nothing left to leak.
    pub async fn close(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(session_id = %self.session_id, error = %e, "delivery task panicked");
            }
        }
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        // Signal shutdown if the channel was never closed explicitly.
        if self.handle.is_some() {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Delivery loop: attempt, back off on transient failure, stop on terminal.
async fn drive(
    transport: Arc<dyn ProgressTransport>,
    config: ChannelConfig,
    session_id: SessionId,
    sink: EventSink,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivered_before = sink.delivered();
        match transport.attempt(&session_id, &sink, &mut shutdown).await {
            Ok(AttemptOutcome::Terminal) => {
                debug!(session_id = %session_id, "terminal event delivered");
                break;
            }
            Ok(AttemptOutcome::Shutdown) => break,
            Ok(AttemptOutcome::Ended) => {
                if sink.delivered() > delivered_before {
                    failures = 0;
                }
            }
            Err(e) => {
                if sink.delivered() > delivered_before {
                    failures = 0;
                }
                failures += 1;
                warn!(
                    session_id = %session_id,
                    error = %e,
                    failures,
                    "progress delivery attempt failed"
                );

                if let Some(max) = config.max_retries {
                    if failures > max {
                        warn!(session_id = %session_id, "retry bound exhausted, giving up");
                        let _ = sink.send(ProgressEvent::error(CONNECTION_LOST_MESSAGE)).await;
                        break;
                    }
                }
            }
        }

        // Backoff before the next attempt, cut short by shutdown.
        tokio::select! {
            _ = sleep(config.retry_delay) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!(session_id = %session_id, "delivery task stopped");
}
