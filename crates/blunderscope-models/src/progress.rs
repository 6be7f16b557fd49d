//! Session lifecycle and progress-event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::results::ResultSet;
use crate::settings::AnalysisSettings;

/// Lifecycle state of an analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session active.
    #[default]
    Idle,
    /// Job submission in flight.
    Submitting,
    /// Progress channel open, remote analysis running.
    Analyzing,
    /// Terminal: results received.
    Completed,
    /// Terminal: submission failed or the remote job reported an error.
    Error,
}

impl SessionStatus {
    /// Returns true for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }

    /// Returns true while the session still expects progress events.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Submitting | SessionStatus::Analyzing)
    }
}

/// One user-initiated analysis request and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, generated before the job is submitted.
    pub id: SessionId,

    /// Current lifecycle state.
    pub status: SessionStatus,

    /// Immutable snapshot of the parameters in effect at start.
    pub settings: AnalysisSettings,

    /// When the session started; drives the remaining-time estimate.
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session in `Submitting` with a settings snapshot.
    pub fn new(id: SessionId, settings: AnalysisSettings) -> Self {
        Self {
            id,
            status: SessionStatus::Submitting,
            settings,
            started_at: Utc::now(),
        }
    }
}

/// Terminal marker carried by the last progress event of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    Completed,
    Error,
}

/// A unit pushed by the server while a session is analyzing.
///
/// Deserialized from both the SSE `data:` payloads and the polling endpoint's
/// JSON responses; the two transports share this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completion percentage, 0-100. Non-monotonic values are tolerated;
    /// the latest value wins for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    /// Human-readable log line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Liveness signal carrying no progress or message.
    #[serde(default)]
    pub heartbeat: bool,

    /// Terminal marker, present on the final event only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TerminalStatus>,

    /// Result payload, present with `status: completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultSet>,

    /// Error message, present with `status: error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    /// Creates a bare heartbeat event.
    pub fn heartbeat() -> Self {
        Self {
            heartbeat: true,
            ..Default::default()
        }
    }

    /// Creates a progress update with a percentage and optional message.
    pub fn progress(percentage: f64, message: Option<&str>) -> Self {
        Self {
            percentage: Some(percentage),
            message: message.map(ToOwned::to_owned),
            ..Default::default()
        }
    }

    /// Creates a terminal completion event carrying the result payload.
    pub fn completed(results: ResultSet) -> Self {
        Self {
            status: Some(TerminalStatus::Completed),
            results: Some(results),
            ..Default::default()
        }
    }

    /// Creates a terminal error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(TerminalStatus::Error),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Returns true when this event ends the session.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }
}

/// Entry in the append-only progress log.
///
/// Ordering is arrival order; entries are never truncated, reordered, or
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The log line.
    pub message: String,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a log entry timestamped now.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
