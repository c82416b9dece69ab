use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::chain::ChainClient;
use crate::config::Config;
use crate::db::Dao;
use crate::model::BlockStatus;

/// Advances the frontier of known block heights and submits both fresh
/// and retry-eligible heights to the fetch queue. Polls no more often
/// than `config.pull_interval`.
pub(crate) async fn run(
    dao: Arc<dyn Dao>,
    chain: Arc<dyn ChainClient>,
    height_tx: mpsc::Sender<u64>,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_poll: Option<Instant> = None;

    loop {
        if *shutdown.borrow() {
            tracing::info!("[listener]: stopped");
            return;
        }

        if let Some(last) = last_poll {
            let elapsed = last.elapsed();
            if elapsed < config.pull_interval {
                if sleep_or_shutdown(config.pull_interval - elapsed, &mut shutdown).await {
                    tracing::info!("[listener]: stopped");
                    return;
                }
            }
        }

        let header = match chain.header_by_number(None).await {
            Ok(h) => h,
            Err(e) => {
                tracing::error!("[listener]: error fetching latest block header: {e}");
                if sleep_or_shutdown(config.retry_interval, &mut shutdown).await {
                    return;
                }
                continue;
            }
        };

        let last_processed = match dao.get_latest_processed_block().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("[listener]: failed to load latest processed block: {e}");
                if sleep_or_shutdown(config.retry_interval, &mut shutdown).await {
                    return;
                }
                continue;
            }
        };

        let floor = last_processed.max(config.begin_block.saturating_sub(1));
        let target = header.number.min(floor + config.block_cache_size as u64);

        for h in (floor + 1)..=target {
            if let Err(e) = dao.add_block(h, BlockStatus::Unprocessed).await {
                tracing::error!("[listener]: failed to add block task {h}: {e}");
                break;
            }
        }

        match dao.get_unprocessed_blocks().await {
            Ok(heights) => {
                for h in heights {
                    tracing::debug!("[listener]: submitting block task {h}");
                    if send_or_shutdown(&height_tx, h, &mut shutdown).await {
                        return;
                    }
                }
            }
            Err(e) => tracing::error!("[listener]: failed to load unprocessed blocks: {e}"),
        }

        match dao
            .get_retry_blocks(config.block_max_retry, config.retry_interval)
            .await
        {
            Ok(heights) => {
                for h in heights {
                    tracing::debug!("[listener]: submitting retry block task {h}");
                    if send_or_shutdown(&height_tx, h, &mut shutdown).await {
                        return;
                    }
                }
            }
            Err(e) => tracing::error!("[listener]: failed to load retry blocks: {e}"),
        }

        last_poll = Some(Instant::now());
    }
}

/// Sleeps for `dur` unless shutdown fires first. Returns true if the
/// caller should stop.
async fn sleep_or_shutdown(dur: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(dur) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

/// Sends `h` on the height-task channel, blocking when full — this is the
/// listener's intended rate limiter — unless shutdown fires first. Returns
/// true if the caller should stop.
async fn send_or_shutdown(
    height_tx: &mpsc::Sender<u64>,
    h: u64,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        res = height_tx.send(h) => res.is_err(),
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}
