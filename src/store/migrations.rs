//! Schema migrations for the SQLite state store.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[&str] = &[
    // v1: reader state values with optional expiry
    "CREATE TABLE IF NOT EXISTS reader_state (
         state_key   TEXT PRIMARY KEY,
         reader_id   TEXT NOT NULL,
         value_json  TEXT NOT NULL,
         expires_at  INTEGER,
         updated_at  INTEGER NOT NULL
     );
     CREATE INDEX IF NOT EXISTS idx_reader_state_expires
         ON reader_state(expires_at) WHERE expires_at IS NOT NULL;",
];

/// Apply pending migrations and return the resulting schema version.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let current: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    for (index, sql) in MIGRATIONS.iter().enumerate() {
        let version = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
        tracing::debug!(version, "applied state store migration");
    }
    Ok(SCHEMA_VERSION.max(current))
}
