use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::model::BlockStatus;

use super::dao::Dao;
use super::DbPool;

/// Concrete DAO adapter backed by pooled SQLite connections: pulls a
/// connection from the r2d2 pool and issues synchronous rusqlite calls
/// directly from the (async) call site rather than wrapping every query in
/// `spawn_blocking`.
pub struct SqliteDao {
    pool: DbPool,
}

impl SqliteDao {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[async_trait::async_trait]
impl Dao for SqliteDao {
    async fn init(&self) -> Result<()> {
        let conn = self.pool.get()?;
        super::schema::run_migrations(&conn)
    }

    async fn add_block(&self, height: u64, status: BlockStatus) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO blocks (height, status, attempts, last_attempt_at)
             VALUES (?1, ?2, 0, NULL)",
            params![height as i64, status.as_str()],
        )?;
        Ok(())
    }

    async fn get_block_status(&self, height: u64) -> Result<Option<BlockStatus>> {
        let conn = self.pool.get()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM blocks WHERE height = ?1",
                params![height as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.and_then(|s| BlockStatus::parse(&s)))
    }

    async fn update_block_status(&self, height: u64, status: BlockStatus) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE blocks SET status = ?1, last_attempt_at = ?2 WHERE height = ?3",
            params![status.as_str(), now_millis(), height as i64],
        )?;
        Ok(())
    }

    async fn get_latest_processed_block(&self) -> Result<u64> {
        let conn = self.pool.get()?;
        let height: Option<i64> = conn.query_row(
            "SELECT MAX(height) FROM blocks WHERE status = ?1",
            params![BlockStatus::Processed.as_str()],
            |row| row.get(0),
        )?;
        Ok(height.unwrap_or(0) as u64)
    }

    async fn get_unprocessed_blocks(&self) -> Result<Vec<u64>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT height FROM blocks WHERE status = ?1 ORDER BY height")?;
        let rows = stmt.query_map(params![BlockStatus::Unprocessed.as_str()], |row| {
            row.get::<_, i64>(0)
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r? as u64);
        }
        Ok(out)
    }

    async fn get_retry_blocks(&self, max_retry: u32, retry_interval: Duration) -> Result<Vec<u64>> {
        let conn = self.pool.get()?;
        let cutoff = now_millis() - retry_interval.as_millis() as i64;
        let mut stmt = conn.prepare(
            "SELECT height FROM blocks
             WHERE status = ?1 AND attempts < ?2
               AND (last_attempt_at IS NULL OR last_attempt_at < ?3)
             ORDER BY height",
        )?;
        let rows = stmt.query_map(params![BlockStatus::Retry.as_str(), max_retry, cutoff], |row| {
            row.get::<_, i64>(0)
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r? as u64);
        }
        Ok(out)
    }

    async fn mark_block_for_retry(&self, height: u64, max_retry: u32) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE blocks SET status = ?1, attempts = attempts + 1, last_attempt_at = ?2
             WHERE height = ?3",
            params![BlockStatus::Retry.as_str(), now_millis(), height as i64],
        )?;

        let attempts: i64 = conn.query_row(
            "SELECT attempts FROM blocks WHERE height = ?1",
            params![height as i64],
            |row| row.get(0),
        )?;

        if attempts as u32 >= max_retry {
            tracing::warn!(height, attempts, max_retry, "block exhausted retries, terminal-failed");
        }

        Ok(())
    }

    async fn reset_stale_processing_blocks(&self, max_processing_time: Duration) -> Result<()> {
        let conn = self.pool.get()?;
        let cutoff = now_millis() - max_processing_time.as_millis() as i64;
        let changed = conn.execute(
            "UPDATE blocks SET status = ?1, attempts = attempts + 1, last_attempt_at = ?2
             WHERE status = ?3 AND last_attempt_at IS NOT NULL AND last_attempt_at < ?4",
            params![
                BlockStatus::Retry.as_str(),
                now_millis(),
                BlockStatus::Processing.as_str(),
                cutoff
            ],
        )?;
        if changed > 0 {
            tracing::info!(count = changed, "swept stale processing blocks back to retry");
        }
        Ok(())
    }
}
