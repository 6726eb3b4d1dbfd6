//! The ingestion orchestrator.
//!
//! Sequences resolve -> append -> score -> materialize -> publish for one
//! request. Dependencies are injected trait objects so the orchestrator can
//! be exercised against fakes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::alerts::{AlertMessage, AlertPublisher, PublishOutcome};
use crate::ingest::{EventSubmission, FailureMode, IngestError, IngestReceipt};
use crate::scoring::{ScoreClient, ScoreContext};
use crate::storage::{AnomalyRecord, AnomalyStore, EventRecord, EventStore, StorageError};
use crate::tenant::{ResolveError, TenantResolver};

pub struct IngestPipeline {
    tenants: Arc<dyn TenantResolver>,
    events: Arc<dyn EventStore>,
    scorer: Arc<dyn ScoreClient>,
    anomalies: Arc<dyn AnomalyStore>,
    alerts: Arc<dyn AlertPublisher>,
    /// Scores strictly above this materialize an anomaly.
    threshold: f64,
}

impl IngestPipeline {
    pub fn new(
        tenants: Arc<dyn TenantResolver>,
        events: Arc<dyn EventStore>,
        scorer: Arc<dyn ScoreClient>,
        anomalies: Arc<dyn AnomalyStore>,
        alerts: Arc<dyn AlertPublisher>,
        threshold: f64,
    ) -> Self {
        Self {
            tenants,
            events,
            scorer,
            anomalies,
            alerts,
            threshold,
        }
    }

    /// Run one ingestion request to completion.
    ///
    /// Succeeds iff authentication and the event append succeed. The scoring
    /// tail runs synchronously within the request but is guarded: none of
    /// its failures can surface to the caller.
    pub async fn ingest(
        &self,
        credential: Option<&str>,
        submission: EventSubmission,
    ) -> Result<IngestReceipt, IngestError> {
        // Authenticating -- must reject with zero storage writes.
        let api_key = credential
            .filter(|c| !c.trim().is_empty())
            .ok_or(IngestError::Unauthenticated)?;
        let tenant = self.tenants.resolve(api_key).map_err(|e| match e {
            ResolveError::NoMatch => IngestError::InvalidCredential,
            ResolveError::Storage(detail) => {
                IngestError::StorageUnavailable(StorageError::Unavailable(detail))
            }
        })?;

        // Persisting -- the single fatal path after auth.
        let event = self
            .events
            .append(tenant, submission.into())
            .map_err(IngestError::StorageUnavailable)?;
        info!(tenant = %tenant, event = %event.id, event_type = %event.event_type, "event persisted");

        // Scoring / Materializing / Publishing -- best-effort. A failure
        // anywhere in here is logged and swallowed; the event is already
        // durable and the caller gets success either way.
        if let Err(err) = self.score_and_alert(&event).await {
            debug_assert_eq!(err.failure_mode(), FailureMode::Degrade);
            warn!(
                tenant = %tenant,
                event = %event.id,
                error = %err,
                "anomaly pipeline degraded, event accepted without detection"
            );
        }

        Ok(IngestReceipt { event_id: event.id })
    }

    /// The detection tail. Every error path out of here is degrade-class.
    async fn score_and_alert(
        &self,
        event: &EventRecord,
    ) -> Result<Option<AnomalyRecord>, IngestError> {
        let context = ScoreContext::from(event);
        let verdict = self.scorer.score(&context).await?;

        if verdict.score <= self.threshold {
            debug!(event = %event.id, score = verdict.score, "below threshold, no anomaly");
            return Ok(None);
        }

        let anomaly = self
            .anomalies
            .materialize(event.id, event.tenant_id, &verdict)
            .map_err(IngestError::AnomalyPersistFailed)?;
        info!(
            tenant = %anomaly.tenant_id,
            event = %event.id,
            anomaly = %anomaly.id,
            score = anomaly.score,
            severity = %anomaly.severity,
            "anomaly materialized"
        );

        let outcome = self
            .alerts
            .publish(AlertMessage::for_anomaly(&anomaly, &event.event_type))?;
        if outcome == PublishOutcome::Skipped {
            debug!(anomaly = %anomaly.id, "alert skipped, no live subscriber");
        }

        Ok(Some(anomaly))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
