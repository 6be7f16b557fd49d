//! Error types for the progress channel.

use thiserror::Error;

/// Errors that can occur while delivering progress events.
///
/// All of these are transient from the controller's point of view: the
/// channel retries after a backoff instead of surfacing them.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Endpoint URL could not be built.
    #[error("endpoint error: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Connection or request failed before any response arrived.
    #[error("connect error: {0}")]
    Connect(String),

    /// The server answered with a non-success status.
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),

    /// The response stream broke mid-delivery.
    #[error("stream error: {0}")]
    Stream(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
