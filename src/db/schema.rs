use rusqlite::Connection;

use crate::error::Result;

const SCHEMA_VERSION: i64 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
        INSERT OR IGNORE INTO schema_version VALUES (1);

        CREATE TABLE IF NOT EXISTS blocks (
            height INTEGER PRIMARY KEY,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_blocks_status ON blocks(status);
        "#,
    )?;

    let version: i64 = conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    )?;

    tracing::info!(schema_version = version, "database initialized");
    assert_eq!(version, SCHEMA_VERSION, "schema version mismatch");

    Ok(())
}
