use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256};
use block_fetcher::chain::ChainClient;
use block_fetcher::error::{IndexerError, Result};
use block_fetcher::model::{BlockHeader, FetchedBlock, Receipt, Transaction};

/// Deterministic stand-in for `AlloyChainClient`: blocks and receipts are
/// registered up front, and individual heights/hashes can be made to fail
/// on demand to exercise the retry and stale-recovery paths.
pub struct FakeChain {
    inner: Mutex<State>,
}

struct State {
    blocks: HashMap<u64, FetchedBlock>,
    head: u64,
    fail_blocks: HashSet<u64>,
    fail_receipts: HashSet<B256>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(State {
                blocks: HashMap::new(),
                head: 0,
                fail_blocks: HashSet::new(),
                fail_receipts: HashSet::new(),
            }),
        })
    }

    /// Registers a block with `count` transactions, each addressed to a
    /// synthetic, distinct recipient so every tx produces a separate event.
    pub fn push_block(&self, number: u64, tx_hashes: Vec<B256>) {
        let mut state = self.inner.lock().unwrap();
        let header = Arc::new(BlockHeader {
            number,
            hash: B256::with_last_byte(number as u8),
            timestamp: number,
        });
        let transactions = tx_hashes
            .into_iter()
            .enumerate()
            .map(|(i, hash)| Transaction {
                hash,
                to: Some(Address::with_last_byte(i as u8 + 1)),
            })
            .collect();

        state.blocks.insert(
            number,
            FetchedBlock {
                header,
                transactions,
            },
        );
        if number > state.head {
            state.head = number;
        }
    }

    /// Registers a contract-creation transaction (no `to`) in `number`.
    pub fn push_creation_tx(&self, number: u64, hash: B256) {
        let mut state = self.inner.lock().unwrap();
        let entry = state.blocks.entry(number).or_insert_with(|| FetchedBlock {
            header: Arc::new(BlockHeader {
                number,
                hash: B256::with_last_byte(number as u8),
                timestamp: number,
            }),
            transactions: Vec::new(),
        });
        entry.transactions.push(Transaction { hash, to: None });
        if number > state.head {
            state.head = number;
        }
    }

    pub fn fail_block(&self, number: u64) {
        self.inner.lock().unwrap().fail_blocks.insert(number);
    }

    pub fn unfail_block(&self, number: u64) {
        self.inner.lock().unwrap().fail_blocks.remove(&number);
    }

    pub fn fail_receipt(&self, hash: B256) {
        self.inner.lock().unwrap().fail_receipts.insert(hash);
    }
}

#[async_trait::async_trait]
impl ChainClient for FakeChain {
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader> {
        let state = self.inner.lock().unwrap();
        let n = number.unwrap_or(state.head);
        Ok(BlockHeader {
            number: n,
            hash: B256::with_last_byte(n as u8),
            timestamp: n,
        })
    }

    async fn block_by_number(&self, number: u64) -> Result<FetchedBlock> {
        let state = self.inner.lock().unwrap();
        if state.fail_blocks.contains(&number) {
            return Err(IndexerError::BlockNotFound(number));
        }
        state
            .blocks
            .get(&number)
            .cloned()
            .ok_or(IndexerError::BlockNotFound(number))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Receipt> {
        let state = self.inner.lock().unwrap();
        if state.fail_receipts.contains(&hash) {
            return Err(IndexerError::ReceiptNotFound(hash));
        }
        Ok(Receipt { status: true })
    }
}
