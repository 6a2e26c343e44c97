//! SQLite-backed reader state store

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::clock::{Clock, SystemClock};
use crate::error::{PopgateError, Result};

use super::migrations;
use super::{ReaderStateStore, StateKey, StoredValue, expiry_after};

/// Durable store; one row per state key, values kept as JSON.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    schema_version: u32,
}

impl SqliteStore {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        Self::from_connection(conn, clock)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, clock)
    }

    fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            schema_version,
        })
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }
}

impl ReaderStateStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &StateKey) -> Result<Option<StoredValue>> {
        let storage_key = key.storage_key();
        let now_ms = self.clock.now().timestamp_millis();
        let conn = self.conn.lock();

        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT value_json, expires_at FROM reader_state WHERE state_key = ?1",
                [&storage_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((raw, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at.is_some_and(|deadline| deadline <= now_ms) {
            conn.execute(
                "DELETE FROM reader_state WHERE state_key = ?1",
                [&storage_key],
            )?;
            return Ok(None);
        }

        let value = serde_json::from_str(&raw).map_err(|err| {
            PopgateError::Storage(format!("corrupt value under {storage_key}: {err}"))
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &StateKey, value: StoredValue, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl)?.map(|at| at.timestamp_millis());
        let payload = serde_json::to_string(&value)
            .map_err(|err| PopgateError::Serialization(format!("state value: {err}")))?;

        self.conn.lock().execute(
            "INSERT INTO reader_state (state_key, reader_id, value_json, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(state_key) DO UPDATE SET
                 value_json = excluded.value_json,
                 expires_at = excluded.expires_at,
                 updated_at = excluded.updated_at",
            params![
                key.storage_key(),
                key.reader_id(),
                payload,
                expires_at,
                now.timestamp_millis()
            ],
        )?;
        Ok(())
    }
}
