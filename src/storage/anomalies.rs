//! Anomaly store. Rows are materialized by the ingestion pipeline when a
//! score crosses the decision threshold; the resolution status is later
//! mutated by an external alert-management collaborator.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreResult;
use crate::storage::{AnomalyId, EventId, Pool, StorageError};
use crate::tenant::TenantId;

/// Analyst-facing resolution state of an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyStatus {
    Open,
    Resolved,
    Safe,
}

impl AnomalyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyStatus::Open => "open",
            AnomalyStatus::Resolved => "resolved",
            AnomalyStatus::Safe => "safe",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "resolved" => AnomalyStatus::Resolved,
            "safe" => AnomalyStatus::Safe,
            _ => AnomalyStatus::Open,
        }
    }
}

/// A persisted anomaly, linked to the event that triggered it. The tenant id
/// is denormalized for per-tenant listing without a join.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRecord {
    pub id: AnomalyId,
    pub event_id: EventId,
    pub tenant_id: TenantId,
    pub score: f64,
    pub severity: String,
    pub explanation: String,
    pub status: AnomalyStatus,
    pub created_at: DateTime<Utc>,
}

/// Persistence for materialized anomalies.
pub trait AnomalyStore: Send + Sync {
    /// Persist an anomaly for a scored event. No deduplication: the caller
    /// decides when to materialize, and every call inserts a new row.
    fn materialize(
        &self,
        event: EventId,
        tenant: TenantId,
        score: &ScoreResult,
    ) -> Result<AnomalyRecord, StorageError>;

    /// List a tenant's anomalies, newest first.
    fn list_for_tenant(
        &self,
        tenant: TenantId,
        limit: usize,
    ) -> Result<Vec<AnomalyRecord>, StorageError>;
}

// ---------------------------------------------------------------------------
// SqliteAnomalyStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteAnomalyStore {
    pool: Pool,
}

impl SqliteAnomalyStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl AnomalyStore for SqliteAnomalyStore {
    fn materialize(
        &self,
        event: EventId,
        tenant: TenantId,
        score: &ScoreResult,
    ) -> Result<AnomalyRecord, StorageError> {
        let conn = self.pool.get()?;

        let record = AnomalyRecord {
            id: AnomalyId::generate(),
            event_id: event,
            tenant_id: tenant,
            score: score.score,
            severity: score.severity.clone(),
            explanation: score.explanation.clone(),
            status: AnomalyStatus::Open,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO anomalies (id, event_id, tenant_id, score, severity, explanation, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.event_id.to_string(),
                record.tenant_id.to_string(),
                record.score,
                record.severity,
                record.explanation,
                record.status.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    fn list_for_tenant(
        &self,
        tenant: TenantId,
        limit: usize,
    ) -> Result<Vec<AnomalyRecord>, StorageError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, event_id, tenant_id, score, severity, explanation, status, created_at
             FROM anomalies WHERE tenant_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![tenant.to_string(), limit], |row| {
            let id_str: String = row.get(0)?;
            let event_str: String = row.get(1)?;
            let tenant_str: String = row.get(2)?;
            let status_str: String = row.get(6)?;
            let created_str: String = row.get(7)?;

            Ok(AnomalyRecord {
                id: AnomalyId::parse(&id_str).unwrap_or(AnomalyId(uuid::Uuid::nil())),
                event_id: EventId::parse(&event_str).unwrap_or(EventId(uuid::Uuid::nil())),
                tenant_id: TenantId::parse(&tenant_str).unwrap_or(TenantId(uuid::Uuid::nil())),
                score: row.get(3)?,
                severity: row.get(4)?,
                explanation: row.get(5)?,
                status: AnomalyStatus::from_str(&status_str),
                created_at: DateTime::parse_from_rfc3339(&created_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;

        let mut anomalies = Vec::new();
        for r in rows {
            anomalies.push(r?);
        }
        Ok(anomalies)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{open_pool, EventDraft, EventStore, SqliteEventStore};
    use crate::tenant::SqliteTenantDirectory;

    fn fixture() -> (
        tempfile::TempDir,
        SqliteEventStore,
        SqliteAnomalyStore,
        TenantId,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomalies.db");
        let pool = open_pool(path.to_str().unwrap()).unwrap();

        let tenant = SqliteTenantDirectory::new(pool.clone())
            .onboard("acme")
            .unwrap();

        (
            dir,
            SqliteEventStore::new(pool.clone()),
            SqliteAnomalyStore::new(pool),
            tenant.id,
        )
    }

    fn critical_score() -> ScoreResult {
        ScoreResult {
            score: 0.92,
            severity: "critical".into(),
            explanation: "Unusual LOGIN_FAILED burst at 03:00".into(),
        }
    }

    #[test]
    fn test_materialize_links_event_and_tenant() {
        let (_dir, events, anomalies, tenant) = fixture();

        let event = events.append(tenant, EventDraft::default()).unwrap();
        let anomaly = anomalies
            .materialize(event.id, tenant, &critical_score())
            .unwrap();

        assert_eq!(anomaly.event_id, event.id);
        assert_eq!(anomaly.tenant_id, tenant);
        assert_eq!(anomaly.status, AnomalyStatus::Open);
        assert!((anomaly.score - 0.92).abs() < f64::EPSILON);
    }

    #[test]
    fn test_list_for_tenant_newest_first() {
        let (_dir, events, anomalies, tenant) = fixture();

        let e1 = events.append(tenant, EventDraft::default()).unwrap();
        let e2 = events.append(tenant, EventDraft::default()).unwrap();
        let a1 = anomalies.materialize(e1.id, tenant, &critical_score()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let a2 = anomalies.materialize(e2.id, tenant, &critical_score()).unwrap();

        let listed = anomalies.list_for_tenant(tenant, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a2.id);
        assert_eq!(listed[1].id, a1.id);
    }

    #[test]
    fn test_list_is_tenant_scoped() {
        let (_dir, events, anomalies, tenant) = fixture();

        let event = events.append(tenant, EventDraft::default()).unwrap();
        anomalies
            .materialize(event.id, tenant, &critical_score())
            .unwrap();

        let other = TenantId::generate();
        assert!(anomalies.list_for_tenant(other, 10).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_materialization_is_not_deduplicated() {
        let (_dir, events, anomalies, tenant) = fixture();

        let event = events.append(tenant, EventDraft::default()).unwrap();
        let a1 = anomalies.materialize(event.id, tenant, &critical_score()).unwrap();
        let a2 = anomalies.materialize(event.id, tenant, &critical_score()).unwrap();

        assert_ne!(a1.id, a2.id);
        assert_eq!(anomalies.list_for_tenant(tenant, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(AnomalyStatus::from_str("open"), AnomalyStatus::Open);
        assert_eq!(AnomalyStatus::from_str("resolved"), AnomalyStatus::Resolved);
        assert_eq!(AnomalyStatus::from_str("safe"), AnomalyStatus::Safe);
        // Unknown values degrade to open rather than failing the read.
        assert_eq!(AnomalyStatus::from_str("???"), AnomalyStatus::Open);
    }
}
