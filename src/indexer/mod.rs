use tokio::sync::mpsc;

use crate::model::EventContext;

pub mod reference;

pub use reference::RecordingIndexer;

/// Capability exposed by every registered indexer (§6.3 of the design
/// doc): an input channel that accepts one `EventContext` per transaction.
/// After consuming a context, the indexer must write exactly one result to
/// `EventContext::reply`; dropping the context without a reply is reported
/// by the dispatcher as an "unknown error".
///
/// Modeled as a capability rather than a tagged enum — indexers interact
/// with the engine exclusively through this channel, never through direct
/// calls.
pub trait Indexer: Send + Sync {
    fn name(&self) -> &str;

    fn input(&self) -> mpsc::Sender<EventContext>;
}
