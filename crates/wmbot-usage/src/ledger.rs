use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use wmbot_core::types::SessionId;

use crate::error::{LedgerError, Result};
use crate::types::UsageRecord;

/// Per-chat usage counter backed by SQLite.
///
/// Wraps a single connection in a `Mutex`, like the other stores. Increments
/// are one upsert statement, so concurrent requests for the same chat never
/// lose an update even across processes sharing the database file.
pub struct UsageLedger {
    db: Mutex<Connection>,
}

impl UsageLedger {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Add one to the chat's counter, creating the row at 1. Returns the new count.
    #[instrument(skip(self), fields(session = %session))]
    pub fn increment(&self, session: SessionId) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.lock()?;
        let count: i64 = db.query_row(
            "INSERT INTO usage_counter (session_id, count, updated_at)
             VALUES (?1, 1, ?2)
             ON CONFLICT(session_id) DO UPDATE
                SET count = count + 1,
                    updated_at = excluded.updated_at
             RETURNING count",
            rusqlite::params![session.as_i64(), now],
            |row| row.get(0),
        )?;
        debug!(count, "usage incremented");
        Ok(count as u64)
    }

    /// Current count for the chat, 0 when it has never been counted.
    pub fn count(&self, session: SessionId) -> Result<u64> {
        Ok(self.get(session)?.map(|r| r.count).unwrap_or(0))
    }

    /// Full record for the chat, if any.
    pub fn get(&self, session: SessionId) -> Result<Option<UsageRecord>> {
        let db = self.lock()?;
        let record = db
            .query_row(
                "SELECT session_id, count, updated_at
                 FROM usage_counter WHERE session_id = ?1",
                rusqlite::params![session.as_i64()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// The busiest chats, highest count first.
    pub fn top(&self, limit: usize) -> Result<Vec<UsageRecord>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(
            "SELECT session_id, count, updated_at
             FROM usage_counter
             ORDER BY count DESC, session_id
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| LedgerError::Poisoned)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    let session: i64 = row.get(0)?;
    let count: i64 = row.get(1)?;
    Ok(UsageRecord {
        session_id: SessionId(session),
        count: count.max(0) as u64,
        updated_at: row.get(2)?,
    })
}
