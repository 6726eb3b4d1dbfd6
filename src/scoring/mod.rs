//! Anomaly scoring -- the contract with the external classification service.
//!
//! Scoring is purely advisory: the client is bounded-time, side-effect free,
//! and its failure never fails ingestion.

pub mod http;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::EventRecord;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring request timed out")]
    Timeout,
    #[error("scoring service unreachable: {0}")]
    Transport(String),
    #[error("scoring service returned status {0}")]
    Status(u16),
    #[error("malformed scoring response: {0}")]
    Malformed(String),
}

/// Event context shipped to the scorer. Tenant identity is deliberately
/// absent: the scoring service is a stateless classifier and does not get
/// to see who the event belongs to.
#[derive(Debug, Clone)]
pub struct ScoreContext {
    pub event_type: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl From<&EventRecord> for ScoreContext {
    fn from(event: &EventRecord) -> Self {
        Self {
            event_type: event.event_type.clone(),
            user_id: event.user_id.clone(),
            ip: event.ip.clone(),
            location: event.location.clone(),
            timestamp: event.timestamp,
            metadata: event.metadata.clone(),
        }
    }
}

/// Verdict returned by the scorer. Ephemeral: consumed by the orchestrator,
/// never persisted as-is.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    /// Anomaly likelihood in `[0.0, 1.0]`.
    pub score: f64,
    pub severity: String,
    pub explanation: String,
}

/// Bounded-time call into the external scoring service.
#[async_trait::async_trait]
pub trait ScoreClient: Send + Sync {
    async fn score(&self, context: &ScoreContext) -> Result<ScoreResult, ScoringError>;
}
