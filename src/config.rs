use std::time::Duration;

use crate::error::{IndexerError, Result};

/// Recognized configuration options (see §6.4 of the design doc). Loaded
/// from the environment rather than a JSON file, following this crate's
/// env-var-driven configuration convention.
pub struct Config {
    pub ethereum_rpc_url: String,
    pub database_path: String,
    pub block_cache_size: usize,
    pub pull_interval: Duration,
    pub retry_interval: Duration,
    pub poll_thread: usize,
    pub block_max_retry: u32,
    pub begin_block: u64,
    pub max_processing_time: Duration,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let ethereum_rpc_url = std::env::var("ETHEREUM_RPC_URL")
            .map_err(|_| IndexerError::Config("ETHEREUM_RPC_URL is required".into()))?;

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/fetcher.db".into());

        let block_cache_size: usize = parse_env("BLOCK_CACHE_SIZE", "64")?;
        let pull_interval_ms: u64 = parse_env("PULL_INTERVAL_MS", "3000")?;
        let retry_interval_ms: u64 = parse_env("RETRY_INTERVAL_MS", "10000")?;
        let poll_thread: usize = parse_env("POLL_THREAD", "4")?;
        let block_max_retry: u32 = parse_env("BLOCK_MAX_RETRY", "5")?;
        let begin_block: u64 = parse_env("BEGIN_BLOCK", "1")?;
        let max_processing_time_ms: u64 = parse_env("MAX_PROCESSING_TIME_MS", "300000")?;
        let server_port: u16 = parse_env("SERVER_PORT", "3000")?;

        if block_cache_size == 0 {
            return Err(IndexerError::Config(
                "BLOCK_CACHE_SIZE must be greater than zero".into(),
            ));
        }
        if poll_thread == 0 {
            return Err(IndexerError::Config(
                "POLL_THREAD must be greater than zero".into(),
            ));
        }

        Ok(Self {
            ethereum_rpc_url,
            database_path,
            block_cache_size,
            pull_interval: Duration::from_millis(pull_interval_ms),
            retry_interval: Duration::from_millis(retry_interval_ms),
            poll_thread,
            block_max_retry,
            begin_block,
            max_processing_time: Duration::from_millis(max_processing_time_ms),
            server_port,
        })
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.into())
        .parse::<T>()
        .map_err(|e| IndexerError::Config(format!("Invalid {key}: {e}")))
}
