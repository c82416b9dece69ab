mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use block_fetcher::config::Config;
use block_fetcher::db::{create_pool, Dao, SqliteDao};
use block_fetcher::fetcher::Fetcher;
use block_fetcher::indexer::{Indexer, RecordingIndexer};
use block_fetcher::model::BlockStatus;
use tokio::sync::watch;

use common::FakeChain;

struct TestConfig {
    block_max_retry: u32,
    retry_interval: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            block_max_retry: 3,
            retry_interval: Duration::from_millis(20),
        }
    }
}

fn build_config(tmp_path: &str, overrides: TestConfig) -> Arc<Config> {
    Arc::new(Config {
        ethereum_rpc_url: "http://localhost:0".into(),
        database_path: tmp_path.into(),
        block_cache_size: 16,
        pull_interval: Duration::from_millis(20),
        retry_interval: overrides.retry_interval,
        poll_thread: 2,
        block_max_retry: overrides.block_max_retry,
        begin_block: 1,
        max_processing_time: Duration::from_secs(3600),
        server_port: 0,
    })
}

fn test_dao(tmp_path: &str) -> Arc<dyn Dao> {
    let pool = create_pool(tmp_path).unwrap();
    Arc::new(SqliteDao::new(pool))
}

/// Polls the given DAO for `height` to reach `want` status, up to `timeout`.
async fn wait_for_status(
    dao: &Arc<dyn Dao>,
    height: u64,
    want: BlockStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if dao.get_block_status(height).await.unwrap() == Some(want) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Polls an arbitrary predicate up to `timeout`.
async fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if f() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn cold_start_processes_every_block_and_reaches_head() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();

    let chain = FakeChain::new();
    chain.push_block(1, vec![B256::with_last_byte(1)]);
    chain.push_block(2, vec![B256::with_last_byte(2)]);
    chain.push_block(3, vec![B256::with_last_byte(3)]);

    let recorder = Arc::new(RecordingIndexer::new("recorder", 0));
    let indexers: Vec<Arc<dyn Indexer>> = vec![recorder.clone()];

    let config = build_config(&db_path, TestConfig::default());
    let fetcher = Fetcher::new(dao.clone(), chain, indexers, config);
    fetcher.init().await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = fetcher.start(shutdown_rx);

    let reached = wait_until(Duration::from_secs(5), || recorder.call_count() >= 3).await;
    assert!(reached, "expected all three blocks to be dispatched");

    assert!(wait_for_status(&dao, 3, BlockStatus::Processed, Duration::from_secs(2)).await);
    assert_eq!(dao.get_latest_processed_block().await.unwrap(), 3);

    let mut seen: Vec<u64> = recorder.received().into_iter().map(|(h, _)| h).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3]);

    let _ = shutdown_tx.send(true);
    handles.join().await;
}

#[tokio::test]
async fn contract_creation_transactions_are_not_dispatched() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();

    let chain = FakeChain::new();
    chain.push_block(1, vec![B256::with_last_byte(1)]);
    chain.push_creation_tx(1, B256::with_last_byte(9));

    let recorder = Arc::new(RecordingIndexer::new("recorder", 0));
    let indexers: Vec<Arc<dyn Indexer>> = vec![recorder.clone()];

    let config = build_config(&db_path, TestConfig::default());
    let fetcher = Fetcher::new(dao.clone(), chain, indexers, config);
    fetcher.init().await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = fetcher.start(shutdown_rx);

    assert!(wait_for_status(&dao, 1, BlockStatus::Processed, Duration::from_secs(5)).await);

    // Only the non-creation transaction should have reached the indexer.
    assert_eq!(recorder.call_count(), 1);

    let _ = shutdown_tx.send(true);
    handles.join().await;
}

#[tokio::test]
async fn transient_fetch_error_recovers_on_retry() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();

    let chain = FakeChain::new();
    chain.push_block(1, vec![B256::with_last_byte(1)]);
    chain.fail_block(1);

    let recorder = Arc::new(RecordingIndexer::new("recorder", 0));
    let indexers: Vec<Arc<dyn Indexer>> = vec![recorder.clone()];

    let config = build_config(
        &db_path,
        TestConfig {
            retry_interval: Duration::from_millis(10),
            ..Default::default()
        },
    );

    let fetcher = Fetcher::new(dao.clone(), chain.clone(), indexers, config);
    fetcher.init().await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = fetcher.start(shutdown_rx);

    // Let it fail a few times, then clear the fault.
    tokio::time::sleep(Duration::from_millis(100)).await;
    chain.unfail_block(1);

    assert!(wait_for_status(&dao, 1, BlockStatus::Processed, Duration::from_secs(5)).await);

    let _ = shutdown_tx.send(true);
    handles.join().await;
}

#[tokio::test]
async fn indexer_failure_is_retried_and_eventually_terminal() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();

    let chain = FakeChain::new();
    chain.push_block(1, vec![B256::with_last_byte(1)]);

    // Always fails: block_max_retry is 3, so the block should keep cycling
    // through Retry with attempts capped at 3 and never reach Processed.
    let failing = Arc::new(RecordingIndexer::new("always-fails", usize::MAX));
    let indexers: Vec<Arc<dyn Indexer>> = vec![failing.clone()];

    let config = build_config(
        &db_path,
        TestConfig {
            retry_interval: Duration::from_millis(5),
            block_max_retry: 3,
        },
    );

    let fetcher = Fetcher::new(dao.clone(), chain, indexers, config);
    fetcher.init().await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = fetcher.start(shutdown_rx);

    let exhausted = wait_until(Duration::from_secs(5), || failing.call_count() >= 3).await;
    assert!(exhausted, "expected at least 3 dispatch attempts");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_ne!(
        dao.get_block_status(1).await.unwrap(),
        Some(BlockStatus::Processed)
    );

    let _ = shutdown_tx.send(true);
    handles.join().await;
}

#[tokio::test]
async fn stale_processing_block_is_swept_back_to_retry() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();
    dao.add_block(1, BlockStatus::Processing).await.unwrap();
    dao.update_block_status(1, BlockStatus::Processing)
        .await
        .unwrap();

    dao.reset_stale_processing_blocks(Duration::from_millis(0))
        .await
        .unwrap();

    assert_eq!(
        dao.get_block_status(1).await.unwrap(),
        Some(BlockStatus::Retry)
    );
}

#[tokio::test]
async fn height_channel_bounds_in_flight_work_to_cache_size() {
    let db = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let db_path = db.to_str().unwrap().to_string();

    let dao = test_dao(&db_path);
    dao.init().await.unwrap();

    let chain = FakeChain::new();
    for h in 1..=50u64 {
        chain.push_block(h, vec![B256::with_last_byte(h as u8)]);
    }

    let recorder = Arc::new(RecordingIndexer::new("recorder", 0));
    let indexers: Vec<Arc<dyn Indexer>> = vec![recorder.clone()];

    let mut config = build_config(&db_path, TestConfig::default());
    Arc::get_mut(&mut config).unwrap().block_cache_size = 5;

    let fetcher = Fetcher::new(dao.clone(), chain, indexers, config);
    fetcher.init().await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = fetcher.start(shutdown_rx);

    assert!(wait_until(Duration::from_secs(10), || recorder.call_count() >= 50).await);
    assert_eq!(dao.get_latest_processed_block().await.unwrap(), 50);

    let _ = shutdown_tx.send(true);
    handles.join().await;
}
