//! `Pipeline` — pulls raw blocks from a source, decodes them, and hands out
//! event batches with resumable offsets.

use std::sync::Arc;

use chainpipe_core::{
    block::Block,
    decoder::BlockDecoder,
    error::StreamError,
    event::Event,
    offset::Offset,
    query::BlockRange,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{DecodeErrorPolicy, PipelineConfig};
use crate::source::{BlockSource, BlockStream};

/// Lifecycle of a pipeline. `Suspended`, `Completed` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Uninitialized,
    Running,
    /// Cancelled through a `CancelHandle`.
    Suspended,
    /// The source is exhausted or the configured range is done.
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Suspended | Self::Completed | Self::Failed)
    }
}

/// Metrics snapshot for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetrics {
    pub blocks_processed: u64,
    pub batches_emitted: u64,
    pub events_emitted: u64,
    pub entries_skipped: u64,
}

/// Requests cancellation of a running pipeline.
///
/// Observed between source pulls; an entry that is being decoded always
/// finishes first.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A single resumable event stream.
///
/// # Usage
/// ```no_run
/// # use std::sync::Arc;
/// # use chainpipe_core::block::EvmBlock;
/// # use chainpipe_evm::EvmLogDecoder;
/// # use chainpipe_stream::{MemoryCheckpointStore, MemorySource, Pipeline, PipelineConfig};
/// # async fn example() -> Result<(), chainpipe_core::StreamError> {
/// let source = MemorySource::<EvmBlock>::new(vec![]);
/// let mut pipeline = Pipeline::new(
///     PipelineConfig::new("usdc").from_block(19_000_000),
///     source,
///     EvmLogDecoder::erc20_transfers(),
///     Arc::new(MemoryCheckpointStore::new()),
/// );
/// while let Some(batch) = pipeline.next_batch().await? {
///     println!("{} transfers", batch.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<S, D>
where
    S: BlockSource,
    D: BlockDecoder<Block = S::Block>,
{
    config: PipelineConfig,
    source: S,
    decoder: D,
    checkpoints: Arc<dyn CheckpointStore>,
    explicit_offset: Option<Offset>,
    state: PipelineState,
    blocks: Option<BlockStream<S::Block>>,
    /// First block to deliver, resolved at start.
    from: u64,
    /// Last block whose events have been handed out.
    last_processed: Option<Offset>,
    /// Delivered but not yet saved: saved on the next pull.
    pending: Option<Offset>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
    metrics: StreamMetrics,
}

impl<S, D> Pipeline<S, D>
where
    S: BlockSource,
    D: BlockDecoder<Block = S::Block>,
{
    pub fn new(
        config: PipelineConfig,
        source: S,
        decoder: D,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            config,
            source,
            decoder,
            checkpoints,
            explicit_offset: None,
            state: PipelineState::Uninitialized,
            blocks: None,
            from: 0,
            last_processed: None,
            pending: None,
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
            metrics: StreamMetrics::default(),
        }
    }

    /// Resume right after `offset`, ignoring any persisted checkpoint.
    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.explicit_offset = Some(offset);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn metrics(&self) -> StreamMetrics {
        self.metrics.clone()
    }

    /// Offset of the last delivered batch.
    pub fn offset(&self) -> Option<&Offset> {
        self.pending.as_ref().or(self.last_processed.as_ref())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the start position and open the source stream.
    ///
    /// Called by the first `next_batch`; calling it again is a no-op.
    pub async fn start(&mut self) -> Result<(), StreamError> {
        if self.state != PipelineState::Uninitialized {
            return Ok(());
        }
        match self.open().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn open(&mut self) -> Result<(), StreamError> {
        let resume = match self.explicit_offset.clone() {
            Some(offset) => Some(offset),
            None => self.checkpoints.load(&self.config.id).await?,
        };
        let from = match (&resume, self.config.from_block) {
            (Some(offset), _) => offset.next_block(),
            (None, Some(block)) => block,
            (None, None) => return Err(StreamError::CheckpointUnavailable),
        };
        let range = BlockRange::new(from, self.config.to_block);
        info!(
            pipeline = %self.config.id,
            decoder = self.decoder.name(),
            from,
            to = ?self.config.to_block,
            resume = ?resume.as_ref().map(ToString::to_string),
            "pipeline starting"
        );
        self.from = from;
        self.last_processed = resume;
        if range.is_empty() {
            info!(pipeline = %self.config.id, "empty block range, nothing to stream");
            self.state = PipelineState::Completed;
            return Ok(());
        }
        let query = self.decoder.query().with_range(range);
        self.blocks = Some(self.source.stream(query).await?);
        self.state = PipelineState::Running;
        Ok(())
    }

    fn fail(&mut self, e: StreamError) -> StreamError {
        error!(pipeline = %self.config.id, error = %e, "pipeline failed");
        self.state = PipelineState::Failed;
        self.blocks = None;
        e
    }

    async fn commit(&mut self) -> Result<(), StreamError> {
        if let Some(offset) = self.pending.take() {
            self.checkpoints.save(&self.config.id, &offset).await?;
            debug!(pipeline = %self.config.id, offset = %offset, "checkpoint saved");
            self.last_processed = Some(offset);
        }
        Ok(())
    }

    /// Pull the next non-empty batch of events.
    ///
    /// Returns `Ok(None)` once the stream is completed or suspended. The
    /// offset of the previous batch is saved when this is called again, so
    /// a crash between two pulls re-delivers at most one batch.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Event<D::Payload>>>, StreamError> {
        if self.state == PipelineState::Uninitialized {
            self.start().await?;
        }
        if let Err(e) = self.commit().await {
            return Err(self.fail(e));
        }
        if self.state != PipelineState::Running {
            return Ok(None);
        }
        loop {
            if *self.cancel_rx.borrow() {
                return Ok(self.suspend());
            }
            let Some(blocks) = self.blocks.as_mut() else {
                return Ok(None);
            };
            let pulled = tokio::select! {
                biased;
                _ = self.cancel_rx.changed() => None,
                item = blocks.next() => Some(item),
            };
            let item = match pulled {
                None => return Ok(self.suspend()),
                Some(item) => item,
            };
            match item {
                None => {
                    self.complete();
                    return Ok(None);
                }
                Some(Err(e)) => return Err(self.fail(e)),
                Some(Ok(raw)) => match self.process(raw) {
                    Err(e) => return Err(self.fail(e)),
                    Ok(events) if events.is_empty() => continue,
                    Ok(events) => {
                        self.metrics.batches_emitted += 1;
                        self.metrics.events_emitted += events.len() as u64;
                        debug!(
                            pipeline = %self.config.id,
                            events = events.len(),
                            offset = ?self.pending.as_ref().map(ToString::to_string),
                            "batch ready"
                        );
                        return Ok(Some(events));
                    }
                },
            }
        }
    }

    /// Decode one raw batch. Advances `pending` past every processed block.
    fn process(&mut self, raw: Vec<S::Block>) -> Result<Vec<Event<D::Payload>>, StreamError> {
        let range = BlockRange::new(self.from, self.config.to_block);
        let mut events = Vec::new();
        let mut processed = None;
        for block in &raw {
            let header = block.header();
            if !range.contains(header.number) {
                continue;
            }
            if self
                .pending
                .as_ref()
                .or(self.last_processed.as_ref())
                .is_some_and(|o| o.covers(header.number))
            {
                // source went backwards; never re-emit
                continue;
            }
            let offset = Offset::from(header);
            for entry in self.decoder.decode_block(block)? {
                match entry {
                    Ok(decoded) => events.push(Event::new(decoded, header, offset.clone())),
                    Err(failure) => match self.config.on_decode_error {
                        DecodeErrorPolicy::Fail => {
                            return Err(failure.into_stream_error(header.number));
                        }
                        DecodeErrorPolicy::Skip => {
                            warn!(
                                pipeline = %self.config.id,
                                block = header.number,
                                tx_index = failure.tx_index,
                                entry_index = failure.entry_index,
                                decoder = %failure.decoder,
                                error = %failure.error,
                                "skipping undecodable entry"
                            );
                            self.metrics.entries_skipped += 1;
                        }
                    },
                }
            }
            self.metrics.blocks_processed += 1;
            processed = Some(offset);
        }
        if events.is_empty() {
            // Nothing delivered, nothing to save; the skip check still
            // needs to know how far we got.
            if let Some(offset) = processed {
                self.last_processed = Some(offset);
            }
        } else {
            events.sort_by_key(|e| e.position());
            self.pending = processed;
        }
        Ok(events)
    }

    fn suspend(&mut self) -> Option<Vec<Event<D::Payload>>> {
        info!(pipeline = %self.config.id, "pipeline suspended");
        self.state = PipelineState::Suspended;
        self.blocks = None;
        None
    }

    fn complete(&mut self) {
        info!(
            pipeline = %self.config.id,
            blocks = self.metrics.blocks_processed,
            events = self.metrics.events_emitted,
            "pipeline completed"
        );
        self.state = PipelineState::Completed;
        self.blocks = None;
    }
}

impl<S, D> Pipeline<S, D>
where
    S: BlockSource + 'static,
    D: BlockDecoder<Block = S::Block> + 'static,
    D::Payload: 'static,
{
    /// Consume the pipeline as a `Stream` of batches.
    ///
    /// The stream ends after the first error. Take a `CancelHandle` first
    /// if the stream must be stopped from elsewhere.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Event<D::Payload>>, StreamError>> {
        stream::unfold(Some(self), |pipeline| async move {
            let mut pipeline = pipeline?;
            match pipeline.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(pipeline))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::source::MemorySource;
    use chainpipe_core::{
        block::{BlockRef, EvmBlock, EvmLog},
        chain::ChainFamily,
        decoder::{Decoded, EntryFailure, EntryResult},
        error::DecodeError,
        event::TxRef,
        query::{DataQuery, FieldSelection},
    };

    /// Emits one event per log; logs with empty data fail to decode.
    struct LogCounter;

    impl BlockDecoder for LogCounter {
        type Block = EvmBlock;
        type Payload = u32;

        fn name(&self) -> &str {
            "log-counter"
        }

        fn query(&self) -> DataQuery {
            DataQuery::new(ChainFamily::Evm, FieldSelection::default().with_block_header())
        }

        fn decode_block(&self, block: &EvmBlock) -> Result<Vec<EntryResult<u32>>, StreamError> {
            Ok(block
                .logs
                .iter()
                .map(|l| {
                    if l.data.is_empty() {
                        Err(EntryFailure {
                            decoder: "counter".into(),
                            tx_index: l.transaction_index,
                            entry_index: l.log_index,
                            error: DecodeError::malformed("empty"),
                        })
                    } else {
                        Ok(Decoded {
                            payload: l.log_index,
                            transaction: TxRef::new(l.transaction_hash.clone(), l.transaction_index),
                            entry_index: l.log_index,
                        })
                    }
                })
                .collect())
        }
    }

    fn log(tx: u32, idx: u32, data: &[u8]) -> EvmLog {
        EvmLog {
            address: "0x1".into(),
            topics: vec![],
            data: data.to_vec(),
            transaction_hash: format!("0xt{tx}"),
            transaction_index: tx,
            log_index: idx,
        }
    }

    fn block(n: u64, logs: Vec<EvmLog>) -> EvmBlock {
        EvmBlock {
            header: BlockRef::new(n, format!("0xb{n}"), 1_700_000_000 + n as i64),
            transactions: vec![],
            logs,
        }
    }

    fn pipeline(
        config: PipelineConfig,
        batches: Vec<Vec<EvmBlock>>,
    ) -> Pipeline<MemorySource<EvmBlock>, LogCounter> {
        Pipeline::new(
            config,
            MemorySource::new(batches),
            LogCounter,
            Arc::new(MemoryCheckpointStore::new()),
        )
    }

    #[tokio::test]
    async fn no_start_position_is_checkpoint_unavailable() {
        let mut p = pipeline(PipelineConfig::new("p"), vec![]);
        assert!(matches!(p.next_batch().await, Err(StreamError::CheckpointUnavailable)));
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn empty_range_completes_without_pulling() {
        let mut p = pipeline(PipelineConfig::new("p").from_block(10).to_block(10), vec![]);
        assert!(p.next_batch().await.unwrap().is_none());
        assert_eq!(p.state(), PipelineState::Completed);
        assert!(p.source.queries().is_empty());
    }

    #[tokio::test]
    async fn events_sorted_within_batch() {
        let batches = vec![vec![
            block(1, vec![log(1, 5, &[1]), log(0, 2, &[1])]),
            block(2, vec![log(0, 0, &[1])]),
        ]];
        let mut p = pipeline(PipelineConfig::new("p").from_block(0), batches);
        let batch = p.next_batch().await.unwrap().unwrap();
        let positions: Vec<_> = batch.iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![(1, 0, 2), (1, 1, 5), (2, 0, 0)]);
        assert_eq!(batch[2].offset, Offset::new(2, "0xb2"));
    }

    /// Serves all of its blocks in one batch, whatever range is asked for.
    struct IgnoresRange(Vec<EvmBlock>);

    #[async_trait::async_trait]
    impl BlockSource for IgnoresRange {
        type Block = EvmBlock;

        async fn stream(&self, _query: DataQuery) -> Result<BlockStream<EvmBlock>, StreamError> {
            Ok(Box::pin(futures::stream::iter(vec![Ok(self.0.clone())])))
        }
    }

    #[tokio::test]
    async fn configured_range_applies_to_an_unfiltered_source() {
        let blocks = (3..10).map(|n| block(n, vec![log(0, 0, &[1])])).collect();
        let mut p = Pipeline::new(
            PipelineConfig::new("p").from_block(5).to_block(8),
            IgnoresRange(blocks),
            LogCounter,
            Arc::new(MemoryCheckpointStore::new()),
        );
        let batch = p.next_batch().await.unwrap().unwrap();
        let numbers: Vec<u64> = batch.iter().map(|e| e.block.number).collect();
        assert_eq!(numbers, vec![5, 6, 7]);
        assert_eq!(p.metrics().blocks_processed, 3);
        assert!(p.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_policy_stops_the_stream() {
        let batches = vec![vec![block(1, vec![log(0, 0, &[1]), log(0, 1, &[])])]];
        let mut p = pipeline(PipelineConfig::new("p").from_block(0), batches);
        let err = p.next_batch().await.unwrap_err();
        assert!(matches!(
            err,
            StreamError::Decode { block_number: 1, tx_index: 0, entry_index: 1, .. }
        ));
        assert_eq!(p.state(), PipelineState::Failed);
        assert!(p.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skip_policy_drops_the_entry() {
        let batches = vec![vec![block(1, vec![log(0, 0, &[1]), log(0, 1, &[])])]];
        let config = PipelineConfig::new("p")
            .from_block(0)
            .on_decode_error(DecodeErrorPolicy::Skip);
        let mut p = pipeline(config, batches);
        let batch = p.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(p.metrics().entries_skipped, 1);
    }

    #[tokio::test]
    async fn cancel_suspends_before_next_pull() {
        let batches = vec![vec![block(1, vec![log(0, 0, &[1])])], vec![block(2, vec![log(0, 0, &[1])])]];
        let mut p = pipeline(PipelineConfig::new("p").from_block(0), batches);
        let handle = p.cancel_handle();
        assert!(p.next_batch().await.unwrap().is_some());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(p.next_batch().await.unwrap().is_none());
        assert_eq!(p.state(), PipelineState::Suspended);
        // the delivered batch was committed by the second pull
        assert_eq!(p.offset(), Some(&Offset::new(1, "0xb1")));
    }

    #[tokio::test]
    async fn source_failure_fails_the_pipeline() {
        let source = MemorySource::from_blocks(vec![block(1, vec![log(0, 0, &[1])])]).fail_after(1);
        let mut p = Pipeline::new(
            PipelineConfig::new("p").from_block(0),
            source,
            LogCounter,
            Arc::new(MemoryCheckpointStore::new()),
        );
        assert!(p.next_batch().await.unwrap().is_some());
        assert!(matches!(
            p.next_batch().await,
            Err(StreamError::SourceUnavailable { .. })
        ));
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn into_stream_yields_batches_until_done() {
        let batches = vec![
            vec![block(1, vec![log(0, 0, &[1])])],
            vec![block(2, vec![])],
            vec![block(3, vec![log(0, 0, &[1]), log(0, 1, &[1])])],
        ];
        let p = pipeline(PipelineConfig::new("p").from_block(0), batches);
        let sizes: Vec<usize> = p
            .into_stream()
            .map(|b| b.unwrap().len())
            .collect()
            .await;
        assert_eq!(sizes, vec![1, 2]);
    }
}
