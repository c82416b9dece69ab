use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::chain::ChainClient;
use crate::db::Dao;
use crate::model::{BlockStatus, FetchedBlock};

/// One worker of the fixed-size fetch pool: receives a height, re-checks
/// ownership against the DAO, fetches the block body, and hands it to the
/// dispatcher via the block channel. Status is deliberately *not*
/// advanced to Processing here — that transition belongs to the
/// Dispatcher so the block channel's buffer also participates in the
/// Processing visibility window (see the Open Question in the design
/// doc's notes on worker status writes).
pub(crate) async fn run(
    index: usize,
    dao: Arc<dyn Dao>,
    chain: Arc<dyn ChainClient>,
    height_rx: Arc<Mutex<mpsc::Receiver<u64>>>,
    block_tx: mpsc::Sender<FetchedBlock>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let mut rx = height_rx.lock().await;
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("[worker {index}]: stopped");
                    return;
                }
            }
            maybe_height = rx.recv() => {
                drop(rx);
                let Some(height) = maybe_height else {
                    tracing::info!("[worker {index}]: height channel closed, stopping");
                    return;
                };

                if process_height(index, &dao, &chain, &block_tx, height, &mut shutdown).await {
                    return;
                }
            }
        }
    }
}

/// Returns true if the caller should stop (shutdown observed while
/// pushing the fetched block).
async fn process_height(
    index: usize,
    dao: &Arc<dyn Dao>,
    chain: &Arc<dyn ChainClient>,
    block_tx: &mpsc::Sender<FetchedBlock>,
    height: u64,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tracing::debug!("[worker {index}]: start fetching block {height}");

    let status = match dao.get_block_status(height).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("[worker {index}]: failed to load block status for {height}: {e}");
            return false;
        }
    };

    match status {
        Some(BlockStatus::Unprocessed) | Some(BlockStatus::Retry) => {}
        _ => {
            tracing::debug!(
                "[worker {index}]: block {height} already owned or processed, skipping"
            );
            return false;
        }
    }

    let block = match chain.block_by_number(height).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("[worker {index}]: error fetching block {height}: {e}");
            return false;
        }
    };

    tokio::select! {
        res = block_tx.send(block) => {
            if res.is_err() {
                tracing::info!("[worker {index}]: block channel closed, stopping");
                return true;
            }
            tracing::debug!("[worker {index}]: fetched block {height}");
            false
        }
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}
