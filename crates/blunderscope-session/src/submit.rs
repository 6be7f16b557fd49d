//! Job submission client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use blunderscope_models::{
    AnalysisDepth, AnalysisSettings, GameType, RatingFilter, ResultFilter, SessionId,
};

use crate::error::{Result, SessionError};

/// Submits an analysis job for a session.
///
/// Trait seam so tests can substitute the HTTP client.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Sends the job-accept request. A non-2xx response or transport error
    /// is a submission failure, fatal to this session attempt only.
    async fn submit(&self, session_id: &SessionId, settings: &AnalysisSettings) -> Result<()>;
}

/// Wire body of `POST /api/analyze`.
///
/// The endpoint's field names are pinned here; they predate this client and
/// mix snake_case and camelCase.
#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    session_id: &'a str,
    username: &'a str,
    #[serde(rename = "gameCount")]
    game_count: u32,
    #[serde(rename = "gameTypes")]
    game_types: &'a [GameType],
    #[serde(rename = "ratingFilter")]
    rating_filter: RatingFilter,
    #[serde(rename = "gameResult")]
    game_result: ResultFilter,
    #[serde(rename = "blunderThreshold")]
    blunder_threshold: f64,
    #[serde(rename = "analysisDepth")]
    analysis_depth: AnalysisDepth,
}

impl<'a> AnalyzeRequest<'a> {
    fn new(session_id: &'a SessionId, settings: &'a AnalysisSettings) -> Self {
        Self {
            session_id: session_id.as_str(),
            username: &settings.username,
            game_count: settings.game_count,
            game_types: &settings.game_types,
            rating_filter: settings.rating_filter,
            game_result: settings.game_result,
            blunder_threshold: settings.blunder_threshold,
            analysis_depth: settings.analysis_depth,
        }
    }
}

/// HTTP submitter against the analysis service.
#[derive(Clone)]
pub struct HttpJobSubmitter {
    client: Client,
    base_url: Url,
}

impl HttpJobSubmitter {
    /// Creates a submitter against the given service base URL.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl JobSubmitter for HttpJobSubmitter {
    async fn submit(&self, session_id: &SessionId, settings: &AnalysisSettings) -> Result<()> {
        let url = self
            .base_url
            .join("api/analyze")
            .map_err(|e| SessionError::Submission(e.to_string()))?;

        debug!(session_id = %session_id, url = %url, "submitting analysis job");

        let response = self
            .client
            .post(url)
            .json(&AnalyzeRequest::new(session_id, settings))
            .send()
            .await
            .map_err(|e| SessionError::Submission(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Submission(format!(
                "analysis service returned {}: {}",
                status, body
            )));
        }

        debug!(session_id = %session_id, "job accepted");
        Ok(())
    }
}
