use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::B256;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::IndexerError;
use crate::model::EventContext;

use super::Indexer;

/// Minimal indexer used by integration tests and as a worked example of
/// how a real indexer plugs into the registry. Not a production indexer —
/// indexer implementations themselves are out of scope (see PURPOSE &
/// SCOPE).
pub struct RecordingIndexer {
    name: String,
    tx: mpsc::Sender<EventContext>,
    received: Arc<Mutex<Vec<(u64, B256)>>>,
    calls: Arc<AtomicUsize>,
    _worker: JoinHandle<()>,
}

impl RecordingIndexer {
    /// The first `fail_first_n` calls return an error; every call after
    /// that succeeds. Pass 0 to always succeed, or `usize::MAX` to always
    /// fail.
    pub fn new(name: impl Into<String>, fail_first_n: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<EventContext>(32);
        let received: Arc<Mutex<Vec<(u64, B256)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let received_worker = received.clone();
        let calls_worker = calls.clone();
        let worker = tokio::spawn(async move {
            while let Some(ctx) = rx.recv().await {
                received_worker
                    .lock()
                    .unwrap()
                    .push((ctx.block_header.number, ctx.transaction.hash));

                let attempt = calls_worker.fetch_add(1, Ordering::SeqCst);
                let result = if attempt < fail_first_n {
                    Err(IndexerError::IndexerFailure(format!(
                        "synthetic failure (attempt {attempt})"
                    )))
                } else {
                    Ok(())
                };

                let _ = ctx.reply.send(result);
            }
        });

        Self {
            name: name.into(),
            tx,
            received,
            calls,
            _worker: worker,
        }
    }

    pub fn received(&self) -> Vec<(u64, B256)> {
        self.received.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Indexer for RecordingIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self) -> mpsc::Sender<EventContext> {
        self.tx.clone()
    }
}
