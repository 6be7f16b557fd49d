//! The analysis-session controller.
//!
//! Owns the full lifecycle of at most one active session: submits the job,
//! opens the progress channel, reconciles incoming events into session
//! state, and terminates the channel deterministically on completion,
//! error, or reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use blunderscope_channel::{build_transport, ProgressChannel, ProgressTransport};
use blunderscope_models::{
    AnalysisSettings, BlunderOccurrence, HeroStat, LogEntry, ProgressEvent, ResultSet, Session,
    SessionId, SessionStatus, TerminalStatus, ValidationReport,
};

use crate::cache::ResultCache;
use crate::config::ControllerConfig;
use crate::error::{Result, SessionError};
use crate::estimate;
use crate::event::SessionUpdate;
use crate::expansion::ExpansionState;
use crate::submit::{HttpJobSubmitter, JobSubmitter};

/// Synthetic log line written on the success path.
const COMPLETION_LOG_MESSAGE: &str = "Analysis complete";

/// Everything the controller tracks for the current session.
///
/// Exclusively owned and mutated by the controller; the UI only reads
/// cloned snapshots.
#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    percentage: f64,
    log: Vec<LogEntry>,
    last_heartbeat: Option<DateTime<Utc>>,
    results_visible: bool,
    cache: ResultCache,
    expansion: ExpansionState,
}

/// Shared parts reachable from the background tasks.
struct Inner {
    state: RwLock<SessionState>,
    channel: Mutex<Option<ProgressChannel>>,
    updates: broadcast::Sender<SessionUpdate>,
    reveal_delay: Duration,
}

impl Inner {
    /// Best-effort fan-out; a missing subscriber is not an error.
    fn broadcast(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }

    /// Closes the open channel, if any. Taking the option makes the close
    /// happen exactly once per terminal transition.
    async fn close_channel(&self) {
        let mut guard = self.channel.lock().await;
        if let Some(mut channel) = guard.take() {
            channel.close().await;
        }
    }
}

/// Orchestrates one analysis session end-to-end.
pub struct AnalysisSessionController {
    config: ControllerConfig,
    submitter: Arc<dyn JobSubmitter>,
    transport: Arc<dyn ProgressTransport>,
    inner: Arc<Inner>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl AnalysisSessionController {
    /// Creates a controller against the analysis service named in `config`.
    pub fn new(config: ControllerConfig) -> Self {
        let client = reqwest::Client::new();
        let submitter = Arc::new(HttpJobSubmitter::new(client.clone(), config.base_url.clone()));
        let transport = build_transport(&client, &config.base_url, &config.channel);
        Self::with_collaborators(config, submitter, transport)
    }

    /// Creates a controller with explicit collaborators (test seam).
    pub fn with_collaborators(
        config: ControllerConfig,
        submitter: Arc<dyn JobSubmitter>,
        transport: Arc<dyn ProgressTransport>,
    ) -> Self {
        let (updates, _) = broadcast::channel(256);

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(SessionState::default()),
                channel: Mutex::new(None),
                updates,
                reveal_delay: config.results_reveal_delay,
            }),
            config,
            submitter,
            transport,
            reconciler: Mutex::new(None),
        }
    }

    /// Subscribes to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.inner.updates.subscribe()
    }

    /// Pre-flight settings validation, exposed as a query for the UI.
    pub fn validate(&self, settings: &AnalysisSettings) -> ValidationReport {
        settings.validate()
    }

    /// Starts a new analysis session.
    ///
    /// A no-op while a session is submitting or analyzing: the live
    /// session's id is returned untouched. Invalid settings fail before
    /// any session is created or any request is sent.
    ///
    /// Returns once the progress channel is open; completion or failure of
    /// the remote job is observed through session state and the update
    /// broadcast, not through this call.
    pub async fn start(&self, settings: AnalysisSettings) -> Result<SessionId> {
        // Idempotent double-submit guard.
        {
            let state = self.inner.state.read().await;
            if let Some(session) = &state.session {
                if session.status.is_live() {
                    debug!(session_id = %session.id, "start ignored, a session is already live");
                    return Ok(session.id.clone());
                }
            }
        }

        let report = settings.validate();
        if !report.is_valid {
            debug!(errors = ?report.errors, "settings failed validation");
            return Err(SessionError::Validation(report));
        }

        let session_id = SessionId::new();
        {
            let mut state = self.inner.state.write().await;
            // The winner is decided under the write lock: a concurrent
            // start that got here first has already installed its session,
            // and this call returns its id without touching any plumbing.
            if let Some(session) = &state.session {
                if session.status.is_live() {
                    return Ok(session.id.clone());
                }
            }
            state.session = Some(Session::new(session_id.clone(), settings.clone()));
            state.percentage = 0.0;
            state.log.clear();
            state.last_heartbeat = None;
            state.results_visible = false;
            state.cache.clear();
            state.expansion.collapse_all();
        }
        self.inner.broadcast(SessionUpdate::StatusChanged {
            session_id: session_id.clone(),
            status: SessionStatus::Submitting,
        });

        info!(
            session_id = %session_id,
            username = %settings.username,
            game_count = settings.game_count,
            "starting analysis session"
        );

        // Tear down the previous session's plumbing before the new channel
        // opens. Only the winning start reaches this point; a late event
        // from the old channel is dropped by the session-id guard.
        self.inner.close_channel().await;
        self.join_reconciler().await;

        // Open the progress channel before the submission settles so events
        // the server emits right after accepting the job are not missed.
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let channel = ProgressChannel::open(
            Arc::clone(&self.transport),
            self.config.channel.clone(),
            session_id.clone(),
            tx,
        );
        *self.inner.channel.lock().await = Some(channel);

        let reconciler_inner = Arc::clone(&self.inner);
        let reconciler_session = session_id.clone();
        let handle = tokio::spawn(async move {
            reconcile(reconciler_inner, reconciler_session, rx).await;
        });
        *self.reconciler.lock().await = Some(handle);

        self.set_status(&session_id, SessionStatus::Analyzing).await;

        let submitter = Arc::clone(&self.submitter);
        let submit_inner = Arc::clone(&self.inner);
        let submit_session = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = submitter.submit(&submit_session, &settings).await {
                warn!(session_id = %submit_session, error = %e, "job submission failed");
                terminate_with_error(&submit_inner, &submit_session, &e.to_string(), true).await;
            }
        });

        Ok(session_id)
    }

    /// Returns all state to its initial empty values.
    ///
    /// Safe to call at any point, including mid-analysis: the outstanding
    /// channel is force-closed before the state is wiped.
    pub async fn reset(&self) {
        info!("resetting session state");

        self.inner.close_channel().await;
        self.join_reconciler().await;

        {
            let mut state = self.inner.state.write().await;
            *state = SessionState::default();
        }
        self.inner.broadcast(SessionUpdate::Reset);
    }

    /// Snapshot of the current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.inner.state.read().await.session.clone()
    }

    /// Current lifecycle status; `Idle` when no session exists.
    pub async fn status(&self) -> SessionStatus {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// Latest displayed percentage, 0-100.
    pub async fn percentage(&self) -> f64 {
        self.inner.state.read().await.percentage
    }

    /// Snapshot of the append-only progress log.
    pub async fn log(&self) -> Vec<LogEntry> {
        self.inner.state.read().await.log.clone()
    }

    /// When the last heartbeat arrived.
    pub async fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().await.last_heartbeat
    }

    /// Whether completed results should be shown yet.
    pub async fn results_visible(&self) -> bool {
        self.inner.state.read().await.results_visible
    }

    /// The cached result set of the completed session, if any.
    pub async fn results(&self) -> Option<ResultSet> {
        self.inner.state.read().await.cache.results().cloned()
    }

    /// The hero stat of the cached result set, if present.
    pub async fn hero_stat(&self) -> Option<HeroStat> {
        self.inner.state.read().await.cache.hero_stat().cloned()
    }

    /// Occurrences of one blunder category, for lazy expansion.
    pub async fn category_occurrences(&self, index: usize) -> Vec<BlunderOccurrence> {
        self.inner
            .state
            .read()
            .await
            .cache
            .category_occurrences(index)
            .to_vec()
    }

    /// Blunder sub-list of one game, for lazy expansion.
    pub async fn game_blunders(&self, game_number: u32) -> Vec<BlunderOccurrence> {
        self.inner
            .state
            .read()
            .await
            .cache
            .game_blunders(game_number)
            .to_vec()
    }

    /// Category indices in severity-descending display order.
    pub async fn categories_by_severity(&self) -> Vec<usize> {
        self.inner
            .state
            .read()
            .await
            .cache
            .categories_by_severity()
            .to_vec()
    }

    /// Toggles one blunder category's expansion; returns the new state.
    pub async fn toggle_category(&self, index: usize) -> bool {
        self.inner.state.write().await.expansion.toggle_category(index)
    }

    /// Toggles one game's expansion; returns the new state.
    pub async fn toggle_game(&self, game_number: u32) -> bool {
        self.inner.state.write().await.expansion.toggle_game(game_number)
    }

    /// Toggles the hero stat's example list; returns the new state.
    pub async fn toggle_hero_examples(&self) -> bool {
        self.inner.state.write().await.expansion.toggle_hero_examples()
    }

    /// Whether one blunder category is expanded.
    pub async fn is_category_expanded(&self, index: usize) -> bool {
        self.inner.state.read().await.expansion.is_category_expanded(index)
    }

    /// Whether one game is expanded.
    pub async fn is_game_expanded(&self, game_number: u32) -> bool {
        self.inner.state.read().await.expansion.is_game_expanded(game_number)
    }

    /// Whether the hero stat's example list is expanded.
    pub async fn hero_examples_expanded(&self) -> bool {
        self.inner.state.read().await.expansion.hero_examples_expanded()
    }

    /// Advisory remaining-time estimate in seconds; `None` without a
    /// session.
    pub async fn remaining_seconds(&self) -> Option<f64> {
        let state = self.inner.state.read().await;
        state
            .session
            .as_ref()
            .map(|s| estimate::remaining_seconds(&s.settings, state.percentage))
    }

    /// Whether a progress channel is currently open.
    pub async fn channel_is_open(&self) -> bool {
        let guard = self.inner.channel.lock().await;
        guard.as_ref().is_some_and(|c| c.is_open())
    }

    /// Sets the session status, skipping stale ids and terminal sessions.
    async fn set_status(&self, session_id: &SessionId, status: SessionStatus) {
        {
            let mut state = self.inner.state.write().await;
            let Some(session) = state.session.as_mut() else {
                return;
            };
            if &session.id != session_id || session.status.is_terminal() {
                return;
            }
            session.status = status;
        }
        self.inner.broadcast(SessionUpdate::StatusChanged {
            session_id: session_id.clone(),
            status,
        });
    }

    /// Joins the previous reconciler task, if one is still around.
    async fn join_reconciler(&self) {
        let handle = self.reconciler.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "reconciler task panicked");
            }
        }
    }
}

/// Applies channel events to session state, in arrival order.
///
/// Runs until the channel's sender side is dropped, which happens once the
/// delivery task ends.
async fn reconcile(
    inner: Arc<Inner>,
    session_id: SessionId,
    mut rx: mpsc::Receiver<ProgressEvent>,
) {
    while let Some(event) = rx.recv().await {
        apply_event(&inner, &session_id, event).await;
    }
    trace!(session_id = %session_id, "reconciler stopped");
}

/// Reconciles one progress event into session state.
async fn apply_event(inner: &Arc<Inner>, session_id: &SessionId, event: ProgressEvent) {
    let mut completed = false;
    let mut updates: Vec<SessionUpdate> = Vec::new();

    {
        let mut state = inner.state.write().await;
        let Some((sid, status)) = state.session.as_ref().map(|s| (s.id.clone(), s.status)) else {
            return;
        };
        if &sid != session_id {
            trace!(session_id = %session_id, "dropping event from stale channel");
            return;
        }
        // Terminal handling is idempotent: once the session ended, every
        // further event (including a repeated terminal) is ignored.
        if status.is_terminal() {
            trace!(session_id = %sid, "ignoring event for terminal session");
            return;
        }

        if event.heartbeat {
            let at = Utc::now();
            state.last_heartbeat = Some(at);
            drop(state);
            inner.broadcast(SessionUpdate::HeartbeatReceived {
                session_id: sid,
                at,
            });
            return;
        }

        if let Some(p) = event.percentage {
            state.percentage = p.clamp(0.0, 100.0);
            updates.push(SessionUpdate::ProgressUpdated {
                session_id: sid.clone(),
                percentage: state.percentage,
            });
        }

        if let Some(message) = &event.message {
            let entry = LogEntry::new(message.clone());
            state.log.push(entry.clone());
            updates.push(SessionUpdate::LogAppended {
                session_id: sid.clone(),
                entry,
            });
        }

        if event.status == Some(TerminalStatus::Completed) {
            if let Some(session) = state.session.as_mut() {
                session.status = SessionStatus::Completed;
            }
            state.percentage = 100.0;

            let entry = LogEntry::new(COMPLETION_LOG_MESSAGE);
            state.log.push(entry.clone());
            state.cache.replace(event.results.clone().unwrap_or_default());
            // The new result set starts fully collapsed.
            state.expansion.collapse_all();

            info!(session_id = %sid, "analysis completed");
            updates.push(SessionUpdate::ProgressUpdated {
                session_id: sid.clone(),
                percentage: 100.0,
            });
            updates.push(SessionUpdate::LogAppended {
                session_id: sid.clone(),
                entry,
            });
            updates.push(SessionUpdate::StatusChanged {
                session_id: sid.clone(),
                status: SessionStatus::Completed,
            });
            updates.push(SessionUpdate::ResultsReady { session_id: sid });
            completed = true;
        }
    }

    for update in updates {
        inner.broadcast(update);
    }

    if completed {
        inner.close_channel().await;
        spawn_reveal(Arc::clone(inner), session_id.clone());
        return;
    }

    if event.status == Some(TerminalStatus::Error) {
        let message = event
            .error
            .clone()
            .unwrap_or_else(|| "Unknown analysis error".to_string());
        terminate_with_error(inner, session_id, &message, false).await;
    }
}

/// Terminates the session in the error state.
///
/// Shared by the submission-failure path and the terminal error event;
/// idempotent against sessions that already ended.
async fn terminate_with_error(
    inner: &Arc<Inner>,
    session_id: &SessionId,
    message: &str,
    from_submission: bool,
) {
    let mut updates: Vec<SessionUpdate> = Vec::new();

    {
        let mut state = inner.state.write().await;
        let Some((sid, status)) = state.session.as_ref().map(|s| (s.id.clone(), s.status)) else {
            return;
        };
        if &sid != session_id || status.is_terminal() {
            return;
        }

        if let Some(session) = state.session.as_mut() {
            session.status = SessionStatus::Error;
        }

        let prefix = if from_submission {
            "Submission failed"
        } else {
            "Analysis failed"
        };
        let entry = LogEntry::new(format!("{}: {}", prefix, message));
        state.log.push(entry.clone());

        updates.push(SessionUpdate::LogAppended {
            session_id: sid.clone(),
            entry,
        });
        updates.push(SessionUpdate::StatusChanged {
            session_id: sid.clone(),
            status: SessionStatus::Error,
        });
        updates.push(if from_submission {
            SessionUpdate::SubmissionFailed {
                session_id: sid,
                message: message.to_string(),
            }
        } else {
            SessionUpdate::AnalysisFailed {
                session_id: sid,
                message: message.to_string(),
            }
        });
    }

    for update in updates {
        inner.broadcast(update);
    }
    inner.close_channel().await;
}

/// Marks results visible after the reveal delay.
///
/// Guarded by session id and status so a stale timer can never mark a later
/// session's results visible.
fn spawn_reveal(inner: Arc<Inner>, session_id: SessionId) {
    tokio::spawn(async move {
        sleep(inner.reveal_delay).await;

        let mut state = inner.state.write().await;
        let still_current = state
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id && s.status == SessionStatus::Completed);
        if still_current && !state.results_visible {
            state.results_visible = true;
            drop(state);
            inner.broadcast(SessionUpdate::ResultsVisible { session_id });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::watch;
    use url::Url;

    use blunderscope_channel::{AttemptOutcome, ChannelConfig, ChannelError, EventSink};
    use blunderscope_models::GameType;

    /// Submitter that records calls and optionally fails.
    struct MockSubmitter {
        calls: AtomicUsize,
        failure: Option<String>,
    }

    impl MockSubmitter {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobSubmitter for MockSubmitter {
        async fn submit(&self, _session_id: &SessionId, _settings: &AnalysisSettings) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(message) => Err(SessionError::Submission(message.clone())),
                None => Ok(()),
            }
        }
    }

    /// Transport that delivers a scripted batch once, then idles until the
    /// channel is closed.
    struct FeedTransport {
        events: StdMutex<Vec<ProgressEvent>>,
    }

    #[async_trait]
    impl ProgressTransport for FeedTransport {
        async fn attempt(
            &self,
            _session_id: &SessionId,
            sink: &EventSink,
            shutdown: &mut watch::Receiver<bool>,
        ) -> std::result::Result<AttemptOutcome, ChannelError> {
            let events = std::mem::take(&mut *self.events.lock().unwrap());
            let terminal = events.last().is_some_and(|e| e.is_terminal());

            for event in events {
                if !sink.send(event).await {
                    return Ok(AttemptOutcome::Shutdown);
                }
            }
            if terminal {
                return Ok(AttemptOutcome::Terminal);
            }

            let _ = shutdown.changed().await;
            Ok(AttemptOutcome::Shutdown)
        }
    }

    /// Transport that delivers one scripted batch per attempt, idling once
    /// the script runs out.
    struct BatchTransport {
        batches: StdMutex<Vec<Vec<ProgressEvent>>>,
    }

    #[async_trait]
    impl ProgressTransport for BatchTransport {
        async fn attempt(
            &self,
            _session_id: &SessionId,
            sink: &EventSink,
            shutdown: &mut watch::Receiver<bool>,
        ) -> std::result::Result<AttemptOutcome, ChannelError> {
            let batch = {
                let mut batches = self.batches.lock().unwrap();
                if batches.is_empty() {
                    None
                } else {
                    Some(batches.remove(0))
                }
            };
            let Some(batch) = batch else {
                let _ = shutdown.changed().await;
                return Ok(AttemptOutcome::Shutdown);
            };

            let terminal = batch.last().is_some_and(|e| e.is_terminal());
            for event in batch {
                if !sink.send(event).await {
                    return Ok(AttemptOutcome::Shutdown);
                }
            }
            if terminal {
                Ok(AttemptOutcome::Terminal)
            } else {
                Ok(AttemptOutcome::Ended)
            }
        }
    }

    struct Harness {
        controller: AnalysisSessionController,
        submitter: Arc<MockSubmitter>,
    }

    fn harness(events: Vec<ProgressEvent>) -> Harness {
        harness_with(events, None)
    }

    fn harness_with(events: Vec<ProgressEvent>, failure: Option<&str>) -> Harness {
        let config = ControllerConfig::new(Url::parse("http://localhost:9999/").unwrap())
            .with_channel(ChannelConfig::new().with_retry_delay(Duration::from_millis(10)))
            .with_results_reveal_delay(Duration::from_millis(50));
        let submitter = Arc::new(MockSubmitter {
            calls: AtomicUsize::new(0),
            failure: failure.map(String::from),
        });
        let transport = Arc::new(FeedTransport {
            events: StdMutex::new(events),
        });
        let controller = AnalysisSessionController::with_collaborators(
            config,
            Arc::clone(&submitter) as Arc<dyn JobSubmitter>,
            transport,
        );

        Harness {
            controller,
            submitter,
        }
    }

    /// Harness whose transport paces batches by the channel's retry delay.
    fn harness_batches(batches: Vec<Vec<ProgressEvent>>, retry_delay: Duration) -> Harness {
        let config = ControllerConfig::new(Url::parse("http://localhost:9999/").unwrap())
            .with_channel(ChannelConfig::new().with_retry_delay(retry_delay))
            .with_results_reveal_delay(Duration::from_millis(50));
        let submitter = Arc::new(MockSubmitter {
            calls: AtomicUsize::new(0),
            failure: None,
        });
        let transport = Arc::new(BatchTransport {
            batches: StdMutex::new(batches),
        });
        let controller = AnalysisSessionController::with_collaborators(
            config,
            Arc::clone(&submitter) as Arc<dyn JobSubmitter>,
            transport,
        );

        Harness {
            controller,
            submitter,
        }
    }

    fn valid_settings() -> AnalysisSettings {
        AnalysisSettings {
            username: "magnus_fan".to_string(),
            game_types: vec![GameType::Blitz],
            ..Default::default()
        }
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionUpdate>, pred: F) -> SessionUpdate
    where
        F: Fn(&SessionUpdate) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(update) if pred(&update) => return update,
                    Ok(_) => {}
                    Err(e) => panic!("update stream closed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for update")
    }

    async fn wait_channel_closed(controller: &AnalysisSessionController) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while controller.channel_is_open().await {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("channel should close");
    }

    #[tokio::test]
    async fn test_start_creates_live_session() {
        let h = harness(vec![]);
        let mut rx = h.controller.subscribe();

        let id = h.controller.start(valid_settings()).await.unwrap();
        assert!(id.as_str().starts_with("sess-"));

        wait_for(&mut rx, |u| {
            matches!(
                u,
                SessionUpdate::StatusChanged {
                    status: SessionStatus::Analyzing,
                    ..
                }
            )
        })
        .await;

        assert_eq!(h.controller.status().await, SessionStatus::Analyzing);
        assert!(h.controller.channel_is_open().await);
        assert_eq!(h.controller.percentage().await, 0.0);
        assert!(h.controller.log().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_while_live_returns_existing_id() {
        let h = harness(vec![]);

        let first = h.controller.start(valid_settings()).await.unwrap();
        let second = h.controller.start(valid_settings()).await.unwrap();
        assert_eq!(first, second);

        // Only the first call submitted a job.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(h.submitter.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_starts_share_one_session() {
        let h = harness(vec![]);

        // Two racing starts must agree on a single session, and the loser
        // must not tear down the winner's channel.
        let (a, b) = tokio::join!(
            h.controller.start(valid_settings()),
            h.controller.start(valid_settings())
        );
        assert_eq!(a.unwrap(), b.unwrap());

        assert_eq!(h.controller.status().await, SessionStatus::Analyzing);
        assert!(h.controller.channel_is_open().await);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(h.submitter.calls(), 1);
        assert!(h.controller.channel_is_open().await);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_settings() {
        let h = harness(vec![]);

        let err = h
            .controller
            .start(AnalysisSettings {
                username: String::new(),
                game_types: vec![],
                ..Default::default()
            })
            .await
            .unwrap_err();

        let report = err.validation_report().expect("validation error");
        assert_eq!(report.error_for("username"), Some("Username is required"));
        assert_eq!(
            report.error_for("game_types"),
            Some("Select at least one game type")
        );

        // Nothing happened: no session, no channel, no network call.
        assert_eq!(h.controller.status().await, SessionStatus::Idle);
        assert!(!h.controller.channel_is_open().await);
        assert_eq!(h.submitter.calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_events_update_state() {
        let h = harness(vec![
            ProgressEvent::progress(35.0, Some("fetched 20 games")),
            ProgressEvent::progress(60.0, Some("analyzing game 5")),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { percentage, .. } if *percentage == 60.0)
        })
        .await;

        assert_eq!(h.controller.percentage().await, 60.0);
        let log = h.controller.log().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "fetched 20 games");
        assert_eq!(log[1].message, "analyzing game 5");

        // Non-terminal events leave the session live and the channel open.
        assert_eq!(h.controller.status().await, SessionStatus::Analyzing);
        assert!(h.controller.channel_is_open().await);
    }

    #[tokio::test]
    async fn test_heartbeat_is_inert() {
        let h = harness(vec![ProgressEvent::heartbeat()]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::HeartbeatReceived { .. })
        })
        .await;

        assert!(h.controller.last_heartbeat().await.is_some());
        // Everything else is untouched.
        assert_eq!(h.controller.percentage().await, 0.0);
        assert!(h.controller.log().await.is_empty());
        assert_eq!(h.controller.status().await, SessionStatus::Analyzing);
    }

    #[tokio::test]
    async fn test_log_keeps_duplicates_in_order() {
        let h = harness(vec![
            ProgressEvent::progress(10.0, Some("analyzing game 3")),
            ProgressEvent::progress(20.0, Some("analyzing game 3")),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { percentage, .. } if *percentage == 20.0)
        })
        .await;

        let log = h.controller.log().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, log[1].message);
    }

    #[tokio::test]
    async fn test_completion_populates_cache_and_reveals() {
        let results = ResultSet {
            games_analyzed: 20,
            total_blunders: 7,
            ..Default::default()
        };
        let h = harness(vec![
            ProgressEvent::progress(90.0, Some("wrapping up")),
            ProgressEvent::completed(results),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| matches!(u, SessionUpdate::ResultsReady { .. })).await;

        assert_eq!(h.controller.status().await, SessionStatus::Completed);
        assert_eq!(h.controller.percentage().await, 100.0);
        let log = h.controller.log().await;
        assert_eq!(log.last().unwrap().message, COMPLETION_LOG_MESSAGE);
        assert_eq!(h.controller.results().await.unwrap().games_analyzed, 20);

        // Results stay hidden until the reveal delay elapses.
        assert!(!h.controller.results_visible().await);
        wait_for(&mut rx, |u| matches!(u, SessionUpdate::ResultsVisible { .. })).await;
        assert!(h.controller.results_visible().await);

        wait_channel_closed(&h.controller).await;
    }

    #[tokio::test]
    async fn test_duplicate_terminal_event_is_ignored() {
        let h = harness(vec![
            ProgressEvent::completed(ResultSet::default()),
            ProgressEvent::completed(ResultSet::default()),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| matches!(u, SessionUpdate::ResultsVisible { .. })).await;

        let completions = h
            .controller
            .log()
            .await
            .iter()
            .filter(|e| e.message == COMPLETION_LOG_MESSAGE)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(h.controller.status().await, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_error_event_terminates_session() {
        let h = harness(vec![
            ProgressEvent::progress(40.0, Some("analyzing game 2")),
            ProgressEvent::error("engine crashed"),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        let update = wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::AnalysisFailed { .. })
        })
        .await;

        let SessionUpdate::AnalysisFailed { message, .. } = update else {
            unreachable!();
        };
        assert_eq!(message, "engine crashed");

        assert_eq!(h.controller.status().await, SessionStatus::Error);
        let log = h.controller.log().await;
        assert_eq!(
            log.last().unwrap().message,
            "Analysis failed: engine crashed"
        );
        assert!(h.controller.results().await.is_none());

        wait_channel_closed(&h.controller).await;
    }

    #[tokio::test]
    async fn test_submission_failure_terminates_session() {
        let h = harness_with(vec![], Some("service unavailable"));
        let mut rx = h.controller.subscribe();

        // start() itself succeeds; the failure surfaces asynchronously.
        h.controller.start(valid_settings()).await.unwrap();
        let update = wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::SubmissionFailed { .. })
        })
        .await;

        let SessionUpdate::SubmissionFailed { message, .. } = update else {
            unreachable!();
        };
        assert!(message.contains("service unavailable"));

        assert_eq!(h.controller.status().await, SessionStatus::Error);
        assert!(h
            .controller
            .log()
            .await
            .last()
            .unwrap()
            .message
            .starts_with("Submission failed"));

        wait_channel_closed(&h.controller).await;
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let h = harness(vec![ProgressEvent::progress(40.0, Some("working"))]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { .. })
        })
        .await;

        h.controller.reset().await;
        wait_for(&mut rx, |u| matches!(u, SessionUpdate::Reset)).await;

        assert_eq!(h.controller.status().await, SessionStatus::Idle);
        assert!(h.controller.session().await.is_none());
        assert_eq!(h.controller.percentage().await, 0.0);
        assert!(h.controller.log().await.is_empty());
        assert!(h.controller.last_heartbeat().await.is_none());
        assert!(h.controller.results().await.is_none());
        assert!(!h.controller.results_visible().await);
        assert!(!h.controller.channel_is_open().await);

        // Reset with nothing to reset is fine.
        h.controller.reset().await;
        assert_eq!(h.controller.status().await, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_percentage_is_clamped_last_write_wins() {
        let h = harness(vec![
            ProgressEvent::progress(150.0, None),
            ProgressEvent::progress(-3.0, None),
            ProgressEvent::progress(30.0, None),
        ]);
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();

        // Broadcasts carry the clamped values, in arrival order.
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { percentage, .. } if *percentage == 100.0)
        })
        .await;
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { percentage, .. } if *percentage == 0.0)
        })
        .await;
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { percentage, .. } if *percentage == 30.0)
        })
        .await;

        // A regression is displayed as-is, not smoothed.
        assert_eq!(h.controller.percentage().await, 30.0);
    }

    #[tokio::test]
    async fn test_remaining_seconds_tracks_progress() {
        let h = harness(vec![ProgressEvent::progress(50.0, None)]);
        let mut rx = h.controller.subscribe();

        assert!(h.controller.remaining_seconds().await.is_none());

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { .. })
        })
        .await;

        // 20 games, balanced depth: 20*40*0.08 + min(15, 20*0.5) = 74s total,
        // so 37s remain at 50%.
        let remaining = h.controller.remaining_seconds().await.unwrap();
        assert!((remaining - 37.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_start_after_completion_begins_fresh() {
        let h = harness(vec![ProgressEvent::completed(ResultSet {
            games_analyzed: 20,
            ..Default::default()
        })]);
        let mut rx = h.controller.subscribe();

        let first = h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| matches!(u, SessionUpdate::ResultsVisible { .. })).await;
        h.controller.toggle_category(0).await;

        // The transport is drained, so the second session just runs live.
        let second = h.controller.start(valid_settings()).await.unwrap();
        assert_ne!(first, second);

        assert_eq!(h.controller.status().await, SessionStatus::Analyzing);
        assert!(h.controller.log().await.is_empty());
        assert_eq!(h.controller.percentage().await, 0.0);
        assert!(h.controller.results().await.is_none());
        assert!(!h.controller.results_visible().await);
        assert!(!h.controller.is_category_expanded(0).await);
        assert!(h.controller.channel_is_open().await);
    }

    #[tokio::test]
    async fn test_toggle_state_roundtrip() {
        let h = harness(vec![]);

        assert!(h.controller.toggle_category(2).await);
        assert!(h.controller.is_category_expanded(2).await);
        assert!(h.controller.toggle_game(7).await);
        assert!(h.controller.is_game_expanded(7).await);
        assert!(h.controller.toggle_hero_examples().await);
        assert!(h.controller.hero_examples_expanded().await);

        assert!(!h.controller.toggle_category(2).await);
        assert!(!h.controller.is_category_expanded(2).await);
    }

    #[tokio::test]
    async fn test_completion_collapses_expansion() {
        // The terminal batch arrives one retry delay after the first, which
        // leaves room to expand items mid-analysis.
        let h = harness_batches(
            vec![
                vec![ProgressEvent::progress(50.0, None)],
                vec![ProgressEvent::completed(ResultSet::default())],
            ],
            Duration::from_millis(200),
        );
        let mut rx = h.controller.subscribe();

        h.controller.start(valid_settings()).await.unwrap();
        wait_for(&mut rx, |u| {
            matches!(u, SessionUpdate::ProgressUpdated { .. })
        })
        .await;

        h.controller.toggle_category(0).await;
        h.controller.toggle_game(1).await;
        assert!(h.controller.is_category_expanded(0).await);

        wait_for(&mut rx, |u| matches!(u, SessionUpdate::ResultsReady { .. })).await;
        assert!(!h.controller.is_category_expanded(0).await);
        assert!(!h.controller.is_game_expanded(1).await);
    }
}
