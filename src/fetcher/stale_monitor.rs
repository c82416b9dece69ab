use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::db::Dao;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically sweeps blocks stuck in Processing back to Retry. A block
/// can get stuck there if its owning dispatcher run crashed or was killed
/// mid-block; this is the engine's self-healing mechanism for that case.
pub(crate) async fn run(dao: Arc<dyn Dao>, max_processing_time: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    // The first tick fires immediately; consume it so the first real sweep
    // happens one interval in, not at startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("[stale monitor]: stopped");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = dao.reset_stale_processing_blocks(max_processing_time).await {
                    tracing::error!("[stale monitor]: failed to reset stale blocks: {e}");
                }
            }
        }
    }
}
