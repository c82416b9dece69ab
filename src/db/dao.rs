use std::time::Duration;

use crate::error::Result;
use crate::model::BlockStatus;

/// Durable store of block records keyed by height (§6.1 of the design
/// doc). The fetch engine is generic over this trait; `SqliteDao` is the
/// concrete adapter this crate ships.
#[async_trait::async_trait]
pub trait Dao: Send + Sync {
    async fn init(&self) -> Result<()>;

    /// Insert-if-absent. A duplicate key is a no-op, not an error.
    async fn add_block(&self, height: u64, status: BlockStatus) -> Result<()>;

    async fn get_block_status(&self, height: u64) -> Result<Option<BlockStatus>>;

    /// Unconditional status write; also touches `last_attempt_at`.
    async fn update_block_status(&self, height: u64, status: BlockStatus) -> Result<()>;

    /// Highest height with status = Processed, or 0 if none. May be
    /// non-contiguous with lower in-flight heights; see Open Question in
    /// §9 of the design doc.
    async fn get_latest_processed_block(&self) -> Result<u64>;

    async fn get_unprocessed_blocks(&self) -> Result<Vec<u64>>;

    /// Rows in Retry with `attempts < max_retry` and `last_attempt_at`
    /// older than `retry_interval`.
    async fn get_retry_blocks(&self, max_retry: u32, retry_interval: Duration) -> Result<Vec<u64>>;

    /// Transition to Retry and increment attempts. If the post-increment
    /// attempt count reaches `max_retry`, the row is still stored but is
    /// terminal-failed: it will never again satisfy `get_retry_blocks`.
    async fn mark_block_for_retry(&self, height: u64, max_retry: u32) -> Result<()>;

    /// Atomically move every row in Processing with
    /// `now - last_attempt_at > max_processing_time` to Retry.
    async fn reset_stale_processing_blocks(&self, max_processing_time: Duration) -> Result<()>;
}
