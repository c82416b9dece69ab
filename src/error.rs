use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] alloy::transports::TransportError),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown error")]
    Unknown,

    #[error("indexer error: {0}")]
    IndexerFailure(String),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("transaction receipt not found: {0}")]
    ReceiptNotFound(alloy::primitives::B256),
}

pub type Result<T> = std::result::Result<T, IndexerError>;
