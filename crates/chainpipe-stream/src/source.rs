//! `BlockSource` trait — abstraction over the upstream block-data portal.
//!
//! A source answers a `DataQuery` with a stream of raw block batches,
//! ascending by block number, limited to the query's range. Filtering by
//! the query's log/instruction filters is an optimization the source may
//! apply; decoders re-check every entry.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chainpipe_core::{block::Block, error::StreamError, query::DataQuery};
use futures::{stream, Stream};

/// Batches of raw blocks from a single query.
pub type BlockStream<B> = Pin<Box<dyn Stream<Item = Result<Vec<B>, StreamError>> + Send>>;

#[async_trait]
pub trait BlockSource: Send + Sync {
    type Block: Block + 'static;

    /// Start streaming blocks for `query`.
    async fn stream(&self, query: DataQuery) -> Result<BlockStream<Self::Block>, StreamError>;
}

#[async_trait]
impl<S: BlockSource + ?Sized> BlockSource for Arc<S> {
    type Block = S::Block;

    async fn stream(&self, query: DataQuery) -> Result<BlockStream<Self::Block>, StreamError> {
        (**self).stream(query).await
    }
}

// ─── In-memory source ─────────────────────────────────────────────────────────

/// Serves a fixed list of block batches, trimmed to the query range.
///
/// Used by tests and demos in place of a portal client. Every query it
/// receives is recorded.
pub struct MemorySource<B> {
    batches: Vec<Vec<B>>,
    /// Fail with `SourceUnavailable` after this many batches.
    fail_after: Option<usize>,
    queries: Mutex<Vec<DataQuery>>,
}

impl<B: Block + Clone + 'static> MemorySource<B> {
    pub fn new(batches: Vec<Vec<B>>) -> Self {
        Self {
            batches,
            fail_after: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// One block per batch.
    pub fn from_blocks(blocks: Vec<B>) -> Self {
        Self::new(blocks.into_iter().map(|b| vec![b]).collect())
    }

    pub fn fail_after(mut self, batches: usize) -> Self {
        self.fail_after = Some(batches);
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<DataQuery> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl<B: Block + Clone + 'static> BlockSource for MemorySource<B> {
    type Block = B;

    async fn stream(&self, query: DataQuery) -> Result<BlockStream<B>, StreamError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.clone());
        }
        let range = query.range;
        let mut items: Vec<Result<Vec<B>, StreamError>> = self
            .batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .filter(|b| range.contains(b.header().number))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .filter(|batch| !batch.is_empty())
            .map(Ok)
            .collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(StreamError::source_unavailable("connection reset")));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
