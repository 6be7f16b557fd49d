//! Error types for session operations.

use thiserror::Error;

use blunderscope_models::ValidationReport;

/// Errors that can occur when driving an analysis session.
///
/// Transient channel errors never appear here; they are retried inside the
/// progress channel. A terminal error event from the remote job surfaces
/// through session state and the update broadcast, not as a `Result`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Settings failed pre-flight validation; no session was created and no
    /// network call was made.
    #[error("settings validation failed")]
    Validation(ValidationReport),

    /// The job-accept request failed; the session was created and then
    /// immediately terminated in the error state.
    #[error("job submission failed: {0}")]
    Submission(String),
}

impl SessionError {
    /// The validation report, when this is a validation error.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            SessionError::Validation(report) => Some(report),
            _ => None,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
