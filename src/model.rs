use std::sync::Arc;

use alloy::primitives::{Address, B256};
use tokio::sync::oneshot;

use crate::error::Result;

/// A block's position in the durable lifecycle state machine (see §4.2 of
/// the design doc: Unprocessed -> Processing -> Processed, with Retry as
/// the recovery branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Unprocessed,
    Processing,
    Processed,
    Retry,
}

impl BlockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockStatus::Unprocessed => "unprocessed",
            BlockStatus::Processing => "processing",
            BlockStatus::Processed => "processed",
            BlockStatus::Retry => "retry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unprocessed" => Some(BlockStatus::Unprocessed),
            "processing" => Some(BlockStatus::Processing),
            "processed" => Some(BlockStatus::Processed),
            "retry" => Some(BlockStatus::Retry),
            _ => None,
        }
    }
}

/// Narrowed projection of the chain client's block header; only the fields
/// the dispatcher and listener actually need.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
}

/// Narrowed projection of a chain transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub hash: B256,
    pub to: Option<Address>,
}

/// Narrowed projection of a transaction receipt; the dispatcher only cares
/// whether the transaction ultimately succeeded.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub status: bool,
}

/// Ephemeral message on the block channel: a fetched block awaiting
/// dispatch. `header` is `Arc`-wrapped because every (transaction, indexer)
/// pair dispatched from this block shares it without cloning.
#[derive(Debug, Clone)]
pub struct FetchedBlock {
    pub header: Arc<BlockHeader>,
    pub transactions: Vec<Transaction>,
}

/// Per-transaction message handed to every registered indexer. The reply
/// channel is single-shot: each indexer must write exactly one result.
pub struct EventContext {
    pub block_header: Arc<BlockHeader>,
    pub transaction: Transaction,
    pub receipt: Receipt,
    pub reply: oneshot::Sender<Result<()>>,
}
