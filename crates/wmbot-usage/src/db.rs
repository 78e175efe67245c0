use rusqlite::{Connection, Result};

/// Initialise usage tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_usage_counter_table(conn)
}

/// One row per chat. `session_id` is the primary key so increments can use
/// a single `INSERT … ON CONFLICT DO UPDATE`.
fn create_usage_counter_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_counter (
            session_id  INTEGER PRIMARY KEY,
            count       INTEGER NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_count
            ON usage_counter(count DESC);",
    )
}
