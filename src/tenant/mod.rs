//! Tenant identity and API-key resolution.
//!
//! Every ingestion request carries an opaque `x-api-key` credential; the
//! resolver maps it to the owning tenant before anything is written. Tenant
//! onboarding happens outside the ingestion path (here: the operator CLI),
//! so the resolver itself is strictly read-only.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::storage::Pool;

/// Unique tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A customer organization whose events are isolated from other tenants.
#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The credential matches no tenant.
    #[error("no tenant matches the supplied API key")]
    NoMatch,
    /// The lookup itself failed. Fatal to the request, like any other
    /// storage failure.
    #[error("tenant lookup failed: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for ResolveError {
    fn from(e: rusqlite::Error) -> Self {
        ResolveError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for ResolveError {
    fn from(e: r2d2::Error) -> Self {
        ResolveError::Storage(e.to_string())
    }
}

/// Maps an opaque credential to the unique tenant bound to it.
/// Deterministic, side-effect free.
pub trait TenantResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<TenantId, ResolveError>;
}

// ---------------------------------------------------------------------------
// SqliteTenantDirectory
// ---------------------------------------------------------------------------

/// SQLite-backed tenant directory: resolution for the ingestion path plus
/// the onboarding operations used by the operator CLI.
#[derive(Clone)]
pub struct SqliteTenantDirectory {
    pool: Pool,
}

impl SqliteTenantDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a tenant with a freshly generated API key.
    pub fn onboard(&self, name: &str) -> Result<Tenant, ResolveError> {
        let conn = self.pool.get()?;

        let tenant = Tenant {
            id: TenantId::generate(),
            name: name.to_string(),
            api_key: format!("lv_{}", Uuid::new_v4().simple()),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO tenants (id, name, api_key, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                tenant.id.to_string(),
                tenant.name,
                tenant.api_key,
                tenant.created_at.to_rfc3339(),
            ],
        )?;

        debug!(tenant = %tenant.id, name = %tenant.name, "tenant onboarded");
        Ok(tenant)
    }

    /// List all tenants, oldest first.
    pub fn list(&self) -> Result<Vec<Tenant>, ResolveError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare("SELECT id, name, api_key, created_at FROM tenants ORDER BY created_at ASC")?;

        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            let created_str: String = row.get(3)?;
            Ok(Tenant {
                id: TenantId::parse(&id_str).unwrap_or(TenantId(Uuid::nil())),
                name: row.get(1)?,
                api_key: row.get(2)?,
                created_at: DateTime::parse_from_rfc3339(&created_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;

        let mut tenants = Vec::new();
        for r in rows {
            tenants.push(r?);
        }
        Ok(tenants)
    }
}

impl TenantResolver for SqliteTenantDirectory {
    fn resolve(&self, credential: &str) -> Result<TenantId, ResolveError> {
        let conn = self.pool.get()?;

        let result = conn.query_row(
            "SELECT id FROM tenants WHERE api_key = ?1",
            [credential],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(id_str) => {
                let id = TenantId::parse(&id_str)
                    .map_err(|e| ResolveError::Storage(e.to_string()))?;
                debug!(tenant = %id, "credential resolved");
                Ok(id)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(ResolveError::NoMatch),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::open_pool;

    fn directory() -> (tempfile::TempDir, SqliteTenantDirectory) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tenants.db");
        let pool = open_pool(path.to_str().unwrap()).unwrap();
        (dir, SqliteTenantDirectory::new(pool))
    }

    #[test]
    fn test_onboard_then_resolve() {
        let (_dir, directory) = directory();

        let tenant = directory.onboard("acme").unwrap();
        assert!(tenant.api_key.starts_with("lv_"));

        let resolved = directory.resolve(&tenant.api_key).unwrap();
        assert_eq!(resolved, tenant.id);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let (_dir, directory) = directory();
        let tenant = directory.onboard("acme").unwrap();

        for _ in 0..5 {
            assert_eq!(directory.resolve(&tenant.api_key).unwrap(), tenant.id);
        }
    }

    #[test]
    fn test_unknown_key_is_no_match() {
        let (_dir, directory) = directory();
        directory.onboard("acme").unwrap();

        let result = directory.resolve("lv_does_not_exist");
        assert!(matches!(result, Err(ResolveError::NoMatch)));
    }

    #[test]
    fn test_keys_are_unique_per_tenant() {
        let (_dir, directory) = directory();

        let a = directory.onboard("acme").unwrap();
        let b = directory.onboard("umbrella").unwrap();
        assert_ne!(a.api_key, b.api_key);
        assert_ne!(a.id, b.id);

        // Each key resolves to its own tenant, never ambiguously.
        assert_eq!(directory.resolve(&a.api_key).unwrap(), a.id);
        assert_eq!(directory.resolve(&b.api_key).unwrap(), b.id);
    }

    #[test]
    fn test_list_returns_all_tenants() {
        let (_dir, directory) = directory();
        directory.onboard("acme").unwrap();
        directory.onboard("umbrella").unwrap();

        let tenants = directory.list().unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].name, "acme");
        assert_eq!(tenants[1].name, "umbrella");
    }
}
