use alloy::primitives::B256;

use crate::error::Result;
use crate::model::{BlockHeader, FetchedBlock, Receipt};

pub mod alloy_client;

pub use alloy_client::AlloyChainClient;

/// Chain RPC contract (§6.2 of the design doc). The engine is generic over
/// this trait; `AlloyChainClient` is the concrete adapter this crate ships.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest header when `number` is `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader>;

    async fn block_by_number(&self, number: u64) -> Result<FetchedBlock>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Receipt>;
}
