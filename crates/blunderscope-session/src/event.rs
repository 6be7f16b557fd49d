//! Updates broadcast to the UI layer.

use chrono::{DateTime, Utc};

use blunderscope_models::{LogEntry, SessionId, SessionStatus};

/// Events emitted by the session controller for UI consumption.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The session's lifecycle state changed.
    StatusChanged {
        /// Session ID.
        session_id: SessionId,
        /// New status.
        status: SessionStatus,
    },
    /// The displayed percentage changed.
    ProgressUpdated {
        /// Session ID.
        session_id: SessionId,
        /// Clamped percentage, 0-100.
        percentage: f64,
    },
    /// A line was appended to the progress log.
    LogAppended {
        /// Session ID.
        session_id: SessionId,
        /// The appended entry.
        entry: LogEntry,
    },
    /// A liveness heartbeat arrived.
    HeartbeatReceived {
        /// Session ID.
        session_id: SessionId,
        /// When it was recorded.
        at: DateTime<Utc>,
    },
    /// The job-accept request failed; the session terminated in error.
    SubmissionFailed {
        /// Session ID.
        session_id: SessionId,
        /// Error message.
        message: String,
    },
    /// The remote job reported a terminal error.
    AnalysisFailed {
        /// Session ID.
        session_id: SessionId,
        /// Error message.
        message: String,
    },
    /// The session completed and the result cache was populated.
    ResultsReady {
        /// Session ID.
        session_id: SessionId,
    },
    /// The reveal delay elapsed; results should be shown.
    ResultsVisible {
        /// Session ID.
        session_id: SessionId,
    },
    /// All session state was returned to its initial values.
    Reset,
}

impl SessionUpdate {
    /// The session this update belongs to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SessionUpdate::StatusChanged { session_id, .. }
            | SessionUpdate::ProgressUpdated { session_id, .. }
            | SessionUpdate::LogAppended { session_id, .. }
            | SessionUpdate::HeartbeatReceived { session_id, .. }
            | SessionUpdate::SubmissionFailed { session_id, .. }
            | SessionUpdate::AnalysisFailed { session_id, .. }
            | SessionUpdate::ResultsReady { session_id }
            | SessionUpdate::ResultsVisible { session_id } => Some(session_id),
            SessionUpdate::Reset => None,
        }
    }

    /// Returns true for the two failure updates.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionUpdate::SubmissionFailed { .. } | SessionUpdate::AnalysisFailed { .. }
        )
    }
}
