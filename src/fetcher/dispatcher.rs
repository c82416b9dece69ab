use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::db::Dao;
use crate::error::IndexerError;
use crate::indexer::Indexer;
use crate::model::{BlockStatus, EventContext, FetchedBlock};

/// Single consumer of the block channel: transitions each block to
/// Processing, fans out every non-creation transaction to all registered
/// indexers, and advances the block to Processed or Retry depending on
/// the outcome. Only one block is ever in flight inside the dispatcher at
/// a time; cross-block ordering is not guaranteed beyond arrival order on
/// the block channel.
pub(crate) async fn run(
    dao: Arc<dyn Dao>,
    indexers: Arc<Vec<Arc<dyn Indexer>>>,
    chain: Arc<dyn crate::chain::ChainClient>,
    mut block_rx: mpsc::Receiver<FetchedBlock>,
    max_retry: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("[dispatcher]: stopped");
                    return;
                }
            }
            maybe_block = block_rx.recv() => {
                let Some(block) = maybe_block else {
                    tracing::info!("[dispatcher]: block channel closed, stopping");
                    return;
                };
                process_block(&dao, &chain, &indexers, block, max_retry, &mut shutdown).await;
            }
        }
    }
}

async fn process_block(
    dao: &Arc<dyn Dao>,
    chain: &Arc<dyn crate::chain::ChainClient>,
    indexers: &Arc<Vec<Arc<dyn Indexer>>>,
    block: FetchedBlock,
    max_retry: u32,
    shutdown: &mut watch::Receiver<bool>,
) {
    let height = block.header.number;
    tracing::debug!(height, "[dispatcher]: start dispatching block");

    if let Err(e) = dao.update_block_status(height, BlockStatus::Processing).await {
        tracing::error!(height, error = %e, "[dispatcher]: failed to update block status to processing");
        return;
    }

    let mut process_err: Option<IndexerError> = None;
    let mut cancelled = false;

    for tx in &block.transactions {
        if *shutdown.borrow() {
            cancelled = true;
            break;
        }

        if tx.to.is_none() {
            tracing::debug!(height, hash = %tx.hash, "[dispatcher]: ignoring contract creation tx");
            continue;
        }

        let receipt = match chain.transaction_receipt(tx.hash).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(height, hash = %tx.hash, error = %e, "[dispatcher]: error fetching receipt");
                process_err = Some(e);
                break;
            }
        };

        let mut replies = Vec::with_capacity(indexers.len());
        for indexer in indexers.iter() {
            let (reply_tx, reply_rx) = oneshot::channel();
            let ctx = EventContext {
                block_header: block.header.clone(),
                transaction: tx.clone(),
                receipt: receipt.clone(),
                reply: reply_tx,
            };

            let input = indexer.input();
            let mut send_shutdown = shutdown.clone();
            tokio::spawn(async move {
                tracing::debug!("[dispatcher]: submitting event to indexer");
                tokio::select! {
                    _ = send_shutdown.changed() => {
                        tracing::debug!("[dispatcher]: stopped before submitting event");
                    }
                    res = input.send(ctx) => {
                        if res.is_err() {
                            tracing::error!("[dispatcher]: indexer input channel closed before accepting event");
                        }
                    }
                }
            });

            replies.push(reply_rx);
        }

        for reply_rx in replies {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(height, "[dispatcher]: stopped while awaiting indexer replies");
                    cancelled = true;
                }
                res = reply_rx => {
                    match res {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::error!(height, hash = %tx.hash, error = %e, "[dispatcher]: indexer reported error");
                            if process_err.is_none() {
                                process_err = Some(e);
                            }
                        }
                        Err(_) => {
                            tracing::error!(height, hash = %tx.hash, "[dispatcher]: reply channel closed");
                            if process_err.is_none() {
                                process_err = Some(IndexerError::Unknown);
                            }
                        }
                    }
                }
            }
        }

        if cancelled {
            break;
        }
    }

    if cancelled {
        tracing::info!(height, "[dispatcher]: stopped mid-block on shutdown, no further state write");
        return;
    }

    match process_err {
        None => {
            if let Err(e) = dao.update_block_status(height, BlockStatus::Processed).await {
                tracing::error!(height, error = %e, "[dispatcher]: failed to update block status to processed");
                return;
            }
            tracing::info!(height, "[dispatcher]: processed block");
        }
        Some(e) => {
            tracing::error!(height, error = %e, "[dispatcher]: failed to process block");
            if let Err(e) = dao.mark_block_for_retry(height, max_retry).await {
                tracing::error!(height, error = %e, "[dispatcher]: failed to mark block for retry");
            }
        }
    }
}
