use std::sync::Arc;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::B256;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::BlockTransactionsKind;
use alloy::transports::http::{Client, Http};

use crate::error::{IndexerError, Result};
use crate::model::{BlockHeader, FetchedBlock, Receipt, Transaction};

use super::ChainClient;

/// Concrete `ChainClient` adapter over an HTTP JSON-RPC endpoint.
pub struct AlloyChainClient {
    provider: RootProvider<Http<Client>>,
}

impl AlloyChainClient {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| IndexerError::Config(format!("invalid RPC URL: {e}")))?;
        Ok(Self {
            provider: ProviderBuilder::new().on_http(url),
        })
    }
}

#[async_trait::async_trait]
impl ChainClient for AlloyChainClient {
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader> {
        let tag = match number {
            Some(n) => BlockNumberOrTag::Number(n),
            None => BlockNumberOrTag::Latest,
        };

        let block = self
            .provider
            .get_block_by_number(tag, BlockTransactionsKind::Hashes)
            .await?
            .ok_or_else(|| IndexerError::BlockNotFound(number.unwrap_or(0)))?;

        Ok(BlockHeader {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        })
    }

    async fn block_by_number(&self, number: u64) -> Result<FetchedBlock> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number), BlockTransactionsKind::Full)
            .await?
            .ok_or(IndexerError::BlockNotFound(number))?;

        let header = Arc::new(BlockHeader {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        });

        let transactions = match block.transactions.as_transactions() {
            Some(txs) => txs
                .iter()
                .map(|tx| Transaction {
                    hash: tx.hash,
                    to: tx.to,
                })
                .collect(),
            None => {
                tracing::warn!(number, "block returned without full transactions");
                Vec::new()
            }
        };

        Ok(FetchedBlock {
            header,
            transactions,
        })
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Receipt> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await?
            .ok_or(IndexerError::ReceiptNotFound(hash))?;

        Ok(Receipt {
            status: receipt.status(),
        })
    }
}
