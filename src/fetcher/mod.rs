use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::chain::ChainClient;
use crate::config::Config;
use crate::db::Dao;
use crate::error::Result;
use crate::indexer::Indexer;

mod dispatcher;
mod listener;
mod stale_monitor;
mod worker;

/// Wires the Listener, the fixed-size worker pool, the Dispatcher, and the
/// Stale-Task Monitor around a shared `Dao`/`ChainClient` pair and a fixed
/// set of registered indexers (§4 of the design doc).
pub struct Fetcher {
    dao: Arc<dyn Dao>,
    chain: Arc<dyn ChainClient>,
    indexers: Arc<Vec<Arc<dyn Indexer>>>,
    config: Arc<Config>,
}

/// Join handles for every task spawned by [`Fetcher::start`]. Dropping this
/// without calling [`FetcherHandles::join`] detaches the tasks; they keep
/// running until shutdown fires independently.
pub struct FetcherHandles {
    listener: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    dispatcher: JoinHandle<()>,
    stale_monitor: JoinHandle<()>,
}

impl FetcherHandles {
    pub async fn join(self) {
        let _ = self.listener.await;
        for w in self.workers {
            let _ = w.await;
        }
        let _ = self.dispatcher.await;
        let _ = self.stale_monitor.await;
    }
}

impl Fetcher {
    pub fn new(
        dao: Arc<dyn Dao>,
        chain: Arc<dyn ChainClient>,
        indexers: Vec<Arc<dyn Indexer>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            dao,
            chain,
            indexers: Arc::new(indexers),
            config,
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.dao.init().await
    }

    /// Spawns every component task and returns their join handles. The
    /// height channel and block channel are both bounded by
    /// `config.block_cache_size`, which is the engine's single
    /// backpressure knob (§5, invariant "bounded buffering").
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> FetcherHandles {
        let (height_tx, height_rx) = mpsc::channel::<u64>(self.config.block_cache_size);
        let (block_tx, block_rx) = mpsc::channel(self.config.block_cache_size);
        let height_rx = Arc::new(Mutex::new(height_rx));

        let listener = tokio::spawn(listener::run(
            self.dao.clone(),
            self.chain.clone(),
            height_tx,
            self.config.clone(),
            shutdown.clone(),
        ));

        let mut workers = Vec::with_capacity(self.config.poll_thread);
        for index in 0..self.config.poll_thread {
            workers.push(tokio::spawn(worker::run(
                index,
                self.dao.clone(),
                self.chain.clone(),
                height_rx.clone(),
                block_tx.clone(),
                shutdown.clone(),
            )));
        }
        drop(block_tx);

        let dispatcher = tokio::spawn(dispatcher::run(
            self.dao.clone(),
            self.indexers.clone(),
            self.chain.clone(),
            block_rx,
            self.config.block_max_retry,
            shutdown.clone(),
        ));

        let stale_monitor = tokio::spawn(stale_monitor::run(
            self.dao.clone(),
            self.config.max_processing_time,
            shutdown,
        ));

        FetcherHandles {
            listener,
            workers,
            dispatcher,
            stale_monitor,
        }
    }
}
