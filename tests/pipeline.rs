//! End-to-end pipeline tests: full wiring over real SQLite storage with a
//! scripted scorer standing in for the external service.

use std::sync::Arc;

use logvigil::alerts::AlertBus;
use logvigil::ingest::{EventSubmission, IngestPipeline};
use logvigil::scoring::{ScoreClient, ScoreContext, ScoreResult, ScoringError};
use logvigil::storage::{
    open_pool, AnomalyStore, EventStore, Pool, SqliteAnomalyStore, SqliteEventStore,
};
use logvigil::tenant::{SqliteTenantDirectory, Tenant};

struct ScriptedScorer {
    verdict: Option<ScoreResult>,
}

#[async_trait::async_trait]
impl ScoreClient for ScriptedScorer {
    async fn score(&self, _context: &ScoreContext) -> Result<ScoreResult, ScoringError> {
        match &self.verdict {
            Some(v) => Ok(v.clone()),
            None => Err(ScoringError::Transport("connection refused".into())),
        }
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    pool: Pool,
    bus: AlertBus,
    tenant: Tenant,
}

fn harness() -> Harness {
    let dir = tempfile::TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("e2e.db").to_str().unwrap()).unwrap();
    let tenant = SqliteTenantDirectory::new(pool.clone())
        .onboard("acme")
        .unwrap();
    Harness {
        _dir: dir,
        pool,
        bus: AlertBus::with_capacity(64),
        tenant,
    }
}

fn pipeline(h: &Harness, verdict: Option<ScoreResult>) -> Arc<IngestPipeline> {
    Arc::new(IngestPipeline::new(
        Arc::new(SqliteTenantDirectory::new(h.pool.clone())),
        Arc::new(SqliteEventStore::new(h.pool.clone())),
        Arc::new(ScriptedScorer { verdict }),
        Arc::new(SqliteAnomalyStore::new(h.pool.clone())),
        Arc::new(h.bus.clone()),
        0.6,
    ))
}

fn critical() -> Option<ScoreResult> {
    Some(ScoreResult {
        score: 0.92,
        severity: "critical".into(),
        explanation: "Unusual LOGIN_FAILED at 03:00".into(),
    })
}

#[tokio::test]
async fn scenario_quiet_login_produces_no_anomaly() {
    let h = harness();
    let pipeline = pipeline(
        &h,
        Some(ScoreResult {
            score: 0.2,
            severity: "low".into(),
            explanation: "Normal activity detected.".into(),
        }),
    );
    let mut rx = h.bus.subscribe();

    let receipt = pipeline
        .ingest(
            Some(&h.tenant.api_key),
            EventSubmission {
                event_type: "LOGIN_SUCCESS".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let events = SqliteEventStore::new(h.pool.clone());
    assert_eq!(events.fetch(receipt.event_id).unwrap().event_type, "LOGIN_SUCCESS");

    let anomalies = SqliteAnomalyStore::new(h.pool.clone());
    assert!(anomalies.list_for_tenant(h.tenant.id, 10).unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn scenario_critical_score_alerts_exactly_once() {
    let h = harness();
    let pipeline = pipeline(&h, critical());
    let mut rx = h.bus.subscribe();

    let receipt = pipeline
        .ingest(
            Some(&h.tenant.api_key),
            EventSubmission {
                event_type: "LOGIN_FAILED".into(),
                user_id: Some("u-7".into()),
                ip: Some("198.51.100.3".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let anomalies = SqliteAnomalyStore::new(h.pool.clone());
    let listed = anomalies.list_for_tenant(h.tenant.id, 10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].event_id, receipt.event_id);
    assert!((listed[0].score - 0.92).abs() < f64::EPSILON);
    assert_eq!(listed[0].severity, "critical");

    let alert = rx.recv().await.unwrap();
    assert_eq!(alert.anomaly_id, listed[0].id);
    assert_eq!(alert.severity, "critical");
    assert!(rx.try_recv().is_err(), "exactly one alert per anomaly");
}

#[tokio::test]
async fn scenario_dead_scorer_degrades_to_plain_ingestion() {
    let h = harness();
    let pipeline = pipeline(&h, None);
    let mut rx = h.bus.subscribe();

    let receipt = pipeline
        .ingest(Some(&h.tenant.api_key), EventSubmission::default())
        .await
        .expect("scorer failure must not fail ingestion");

    let events = SqliteEventStore::new(h.pool.clone());
    assert!(events.fetch(receipt.event_id).is_ok());

    let anomalies = SqliteAnomalyStore::new(h.pool.clone());
    assert!(anomalies.list_for_tenant(h.tenant.id, 10).unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn concurrent_ingestion_yields_unique_event_ids() {
    let h = harness();
    let pipeline = pipeline(&h, critical());

    let mut handles = Vec::new();
    for i in 0..32 {
        let pipeline = pipeline.clone();
        let key = h.tenant.api_key.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .ingest(
                    Some(&key),
                    EventSubmission {
                        event_type: format!("EVENT_{i}"),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
                .event_id
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()), "duplicate event id");
    }
    assert_eq!(ids.len(), 32);

    let anomalies = SqliteAnomalyStore::new(h.pool.clone());
    assert_eq!(anomalies.list_for_tenant(h.tenant.id, 100).unwrap().len(), 32);
}

#[tokio::test]
async fn anomalies_stay_isolated_per_tenant() {
    let h = harness();
    let directory = SqliteTenantDirectory::new(h.pool.clone());
    let other = directory.onboard("umbrella").unwrap();

    let pipeline = pipeline(&h, critical());

    pipeline
        .ingest(Some(&h.tenant.api_key), EventSubmission::default())
        .await
        .unwrap();
    pipeline
        .ingest(Some(&other.api_key), EventSubmission::default())
        .await
        .unwrap();

    let anomalies = SqliteAnomalyStore::new(h.pool.clone());
    let mine = anomalies.list_for_tenant(h.tenant.id, 10).unwrap();
    let theirs = anomalies.list_for_tenant(other.id, 10).unwrap();

    assert_eq!(mine.len(), 1);
    assert_eq!(theirs.len(), 1);
    assert_ne!(mine[0].tenant_id, theirs[0].tenant_id);
}
