//! HTTP client for the external scoring service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ScoreClient, ScoreContext, ScoreResult, ScoringError};
use crate::config::ScoringConfig;

/// Wire request, camelCase per the scorer's API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRequestBody<'a> {
    event_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponseBody {
    anomaly_score: f64,
    severity: String,
    explanation: String,
}

/// Scoring client over HTTP with a client-level timeout. The timeout is
/// distinct from the ingestion request's own lifetime: a hung scorer
/// degrades to "no anomaly detected" instead of hanging the response.
pub struct HttpScoreClient {
    client: Client,
    score_url: String,
}

impl HttpScoreClient {
    pub fn new(config: &ScoringConfig) -> anyhow::Result<Self> {
        Self::with_timeout(&config.base_url, config.timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            score_url: format!("{}/ai/score", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl ScoreClient for HttpScoreClient {
    async fn score(&self, context: &ScoreContext) -> Result<ScoreResult, ScoringError> {
        let body = ScoreRequestBody {
            event_type: &context.event_type,
            user_id: context.user_id.as_deref(),
            ip: context.ip.as_deref(),
            location: context.location.as_deref(),
            timestamp: context.timestamp,
            metadata: context.metadata.as_ref(),
        };

        let response = self
            .client
            .post(&self.score_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout
                } else {
                    ScoringError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Status(status.as_u16()));
        }

        let parsed: ScoreResponseBody = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ScoringError::Timeout
            } else {
                ScoringError::Malformed(e.to_string())
            }
        })?;

        // The scorer promises a bounded score; anything outside the bound is
        // a broken response, not a valid verdict.
        if !parsed.anomaly_score.is_finite() || !(0.0..=1.0).contains(&parsed.anomaly_score) {
            return Err(ScoringError::Malformed(format!(
                "anomalyScore out of range: {}",
                parsed.anomaly_score
            )));
        }

        Ok(ScoreResult {
            score: parsed.anomaly_score,
            severity: parsed.severity,
            explanation: parsed.explanation,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
