//! Durable event store. Events are append-only: once a row is written it is
//! never updated or deleted by this service.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::storage::{EventId, Pool, StorageError};
use crate::tenant::TenantId;

/// Event fields as submitted by a tenant, before an identifier is assigned.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub event_type: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    /// When absent, receipt time is used.
    pub timestamp: Option<DateTime<Utc>>,
    pub resource: Option<String>,
    /// Opaque payload, stored verbatim and never interpreted.
    pub metadata: Option<serde_json::Value>,
}

/// A persisted event.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub event_type: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Append-only persistence for ingested events.
///
/// `append` must be durable before it returns: a caller holding an
/// [`EventId`] can rely on `fetch` seeing the row.
pub trait EventStore: Send + Sync {
    fn append(&self, tenant: TenantId, draft: EventDraft) -> Result<EventRecord, StorageError>;
    fn fetch(&self, id: EventId) -> Result<EventRecord, StorageError>;
}

// ---------------------------------------------------------------------------
// SqliteEventStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteEventStore {
    pool: Pool,
}

impl SqliteEventStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl EventStore for SqliteEventStore {
    fn append(&self, tenant: TenantId, draft: EventDraft) -> Result<EventRecord, StorageError> {
        let conn = self.pool.get()?;

        let now = Utc::now();
        let record = EventRecord {
            id: EventId::generate(),
            tenant_id: tenant,
            event_type: draft.event_type,
            user_id: draft.user_id,
            ip: draft.ip,
            location: draft.location,
            timestamp: draft.timestamp.unwrap_or(now),
            resource: draft.resource,
            metadata: draft.metadata,
            created_at: now,
        };

        let metadata_json = match &record.metadata {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        conn.execute(
            "INSERT INTO events (id, tenant_id, event_type, user_id, ip, location, timestamp, resource, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.tenant_id.to_string(),
                record.event_type,
                record.user_id,
                record.ip,
                record.location,
                record.timestamp.to_rfc3339(),
                record.resource,
                metadata_json,
                record.created_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    fn fetch(&self, id: EventId) -> Result<EventRecord, StorageError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, event_type, user_id, ip, location, timestamp, resource, metadata_json, created_at
             FROM events WHERE id = ?1",
        )?;

        let result = stmt.query_row([id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let tenant_str: String = row.get(1)?;
            let timestamp_str: String = row.get(6)?;
            let metadata_str: Option<String> = row.get(8)?;
            let created_str: String = row.get(9)?;

            Ok(EventRecord {
                id: EventId::parse(&id_str).unwrap_or(EventId(uuid::Uuid::nil())),
                tenant_id: TenantId::parse(&tenant_str)
                    .unwrap_or(TenantId(uuid::Uuid::nil())),
                event_type: row.get(2)?,
                user_id: row.get(3)?,
                ip: row.get(4)?,
                location: row.get(5)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
                resource: row.get(7)?,
                metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
                created_at: DateTime::parse_from_rfc3339(&created_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        });

        match result {
            Ok(record) => Ok(record),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
