//! Real-time alert stream.
//!
//! Materialized anomalies are announced on a single shared, ordered,
//! append-only stream under the fixed topic [`ALERT_TOPIC`]. All tenants
//! share the stream; tenant identity travels inside each message so
//! downstream consumers can filter. The alert is a best-effort notification
//! of the durable anomaly row, not durable state of its own: publish makes
//! at most one attempt, and when no subscriber is live the attempt is
//! skipped entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::storage::{AnomalyId, AnomalyRecord, EventId};
use crate::tenant::TenantId;

/// Topic name of the shared alert stream.
pub const ALERT_TOPIC: &str = "security_alerts";

/// Fire-and-forget notification of a newly materialized anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMessage {
    pub tenant_id: TenantId,
    pub event_id: EventId,
    pub anomaly_id: AnomalyId,
    pub event_type: String,
    pub severity: String,
    pub explanation: String,
    pub published_at: DateTime<Utc>,
}

impl AlertMessage {
    /// Build the message for an anomaly, stamped with the publish time.
    pub fn for_anomaly(anomaly: &AnomalyRecord, event_type: &str) -> Self {
        Self {
            tenant_id: anomaly.tenant_id,
            event_id: anomaly.event_id,
            anomaly_id: anomaly.id,
            event_type: event_type.to_string(),
            severity: anomaly.severity.clone(),
            explanation: anomaly.explanation.clone(),
            published_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("alert stream rejected the message: {0}")]
    Rejected(String),
}

/// What happened to a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered to at least one live subscriber.
    Published,
    /// No subscriber was live; the attempt was skipped.
    Skipped,
}

/// Best-effort publisher onto the shared alert stream.
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, message: AlertMessage) -> Result<PublishOutcome, PublishError>;
}

// ---------------------------------------------------------------------------
// AlertBus
// ---------------------------------------------------------------------------

/// In-process alert stream backed by a tokio broadcast channel. Cloning is
/// cheap; all clones feed the same stream.
#[derive(Clone)]
pub struct AlertBus {
    sender: broadcast::Sender<AlertMessage>,
}

impl AlertBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the stream. Messages published before this call are not
    /// replayed; slow subscribers past the channel capacity lose the oldest
    /// messages.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AlertPublisher for AlertBus {
    fn publish(&self, message: AlertMessage) -> Result<PublishOutcome, PublishError> {
        // Mirror of the "connection must be live" precondition: with nobody
        // subscribed the publish step is skipped, not errored.
        if self.sender.receiver_count() == 0 {
            debug!(topic = ALERT_TOPIC, anomaly = %message.anomaly_id, "no live subscriber, alert skipped");
            return Ok(PublishOutcome::Skipped);
        }

        match self.sender.send(message) {
            Ok(receivers) => {
                debug!(topic = ALERT_TOPIC, receivers, "alert published");
                Ok(PublishOutcome::Published)
            }
            // All receivers dropped between the check and the send.
            Err(_) => Ok(PublishOutcome::Skipped),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> AlertMessage {
        AlertMessage {
            tenant_id: TenantId::generate(),
            event_id: EventId::generate(),
            anomaly_id: AnomalyId::generate(),
            event_type: "LOGIN_FAILED".into(),
            severity: "critical".into(),
            explanation: "Unusual LOGIN_FAILED at 03:00".into(),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_alert() {
        let bus = AlertBus::with_capacity(16);
        let mut rx = bus.subscribe();

        let sent = message();
        let outcome = bus.publish(sent.clone()).unwrap();
        assert_eq!(outcome, PublishOutcome::Published);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.anomaly_id, sent.anomaly_id);
        assert_eq!(received.severity, "critical");
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_skipped() {
        let bus = AlertBus::with_capacity(16);
        assert_eq!(bus.subscriber_count(), 0);

        let outcome = bus.publish(message()).unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_all_subscribers_see_every_alert() {
        let bus = AlertBus::with_capacity(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = message();
        bus.publish(sent.clone()).unwrap();

        assert_eq!(rx1.recv().await.unwrap().anomaly_id, sent.anomaly_id);
        assert_eq!(rx2.recv().await.unwrap().anomaly_id, sent.anomaly_id);
    }

    #[tokio::test]
    async fn test_publish_is_at_most_once() {
        let bus = AlertBus::with_capacity(16);
        let mut rx = bus.subscribe();

        bus.publish(message()).unwrap();

        rx.recv().await.unwrap();
        // Nothing further: one publish, one delivery.
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_message_wire_format_is_camel_case() {
        let json = serde_json::to_value(message()).unwrap();
        for field in [
            "tenantId",
            "eventId",
            "anomalyId",
            "eventType",
            "severity",
            "explanation",
            "publishedAt",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
