//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            api_key TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            event_type TEXT NOT NULL,
            user_id TEXT,
            ip TEXT,
            location TEXT,
            timestamp TEXT NOT NULL,
            resource TEXT,
            metadata_json TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS anomalies (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id),
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            score REAL NOT NULL,
            severity TEXT NOT NULL,
            explanation TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tenants_api_key ON tenants(api_key);
        CREATE INDEX IF NOT EXISTS idx_events_tenant ON events(tenant_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_anomalies_tenant ON anomalies(tenant_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_anomalies_event ON anomalies(event_id);",
    )?;

    // Migration: add 'status' to anomalies created by pre-release schemas
    let has_status: i32 = conn
        .query_row(
            "SELECT count(*) FROM pragma_table_info('anomalies') WHERE name='status'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if has_status == 0 {
        conn.execute(
            "ALTER TABLE anomalies ADD COLUMN status TEXT NOT NULL DEFAULT 'open'",
            [],
        )?;
    }

    Ok(())
}
