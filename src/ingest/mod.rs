//! Ingestion pipeline -- types and the failure-isolation contract.
//!
//! The pipeline's defining property is asymmetric failure handling: a
//! storage failure fails the whole request, while everything downstream of
//! storage (scoring, anomaly materialization, alert publishing) is
//! best-effort. [`IngestError::failure_mode`] makes that policy a typed,
//! testable contract instead of ad hoc catch placement.
//!
//! Ingestion is not idempotent: there is no dedup key, so a client retrying
//! an already-accepted submission creates a second event (and potentially a
//! second anomaly). Deliberately kept -- each call is a distinct occurrence.

pub mod pipeline;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::PublishError;
use crate::scoring::ScoringError;
use crate::storage::{EventDraft, EventId, StorageError};

pub use pipeline::IngestPipeline;

/// Whether a pipeline failure aborts the request or degrades it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The request fails; the caller gets an error response.
    Abort,
    /// Logged and swallowed; the caller still gets success for the
    /// persisted event.
    Degrade,
}

/// Everything that can go wrong during one ingestion call.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No credential was supplied with the request.
    #[error("missing API key")]
    Unauthenticated,
    /// The credential matches no tenant.
    #[error("invalid API key")]
    InvalidCredential,
    /// Persisting the event failed. The single fatal path after auth.
    #[error("event storage unavailable: {0}")]
    StorageUnavailable(StorageError),
    /// The scorer timed out, was unreachable, or answered garbage.
    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(#[from] ScoringError),
    /// The event is stored but the anomaly row could not be written.
    #[error("anomaly persistence failed: {0}")]
    AnomalyPersistFailed(StorageError),
    /// The anomaly is stored but the alert could not be published.
    #[error("alert publish failed: {0}")]
    PublishFailed(#[from] PublishError),
}

impl IngestError {
    /// The failure-isolation policy of the whole pipeline: auth and event
    /// storage abort, everything downstream of the stored event degrades.
    pub fn failure_mode(&self) -> FailureMode {
        match self {
            IngestError::Unauthenticated
            | IngestError::InvalidCredential
            | IngestError::StorageUnavailable(_) => FailureMode::Abort,
            IngestError::ScoringUnavailable(_)
            | IngestError::AnomalyPersistFailed(_)
            | IngestError::PublishFailed(_) => FailureMode::Degrade,
        }
    }
}

/// One submitted occurrence, as received from a tenant's instrumented
/// application. `eventType` is required by convention only; an absent field
/// becomes an empty string rather than a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSubmission {
    pub event_type: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl From<EventSubmission> for EventDraft {
    fn from(s: EventSubmission) -> Self {
        EventDraft {
            event_type: s.event_type,
            user_id: s.user_id,
            ip: s.ip,
            location: s.location,
            timestamp: s.timestamp,
            resource: s.resource,
            metadata: s.metadata,
        }
    }
}

/// Acknowledgment returned on acceptance. Says nothing about scoring: the
/// caller never learns whether anomaly detection ran or succeeded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub event_id: EventId,
}
