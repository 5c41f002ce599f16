//! End-to-end pipeline tests over an in-memory block source.

use std::sync::Arc;

use alloy_primitives::U256;
use chainpipe_core::{
    block::{BlockRef, EvmBlock, EvmLog},
    error::StreamError,
    offset::Offset,
};
use chainpipe_evm::{erc20::TRANSFER_TOPIC, Erc20Transfer, EvmLogDecoder};
use chainpipe_stream::{
    CheckpointStore, DecodeErrorPolicy, MemoryCheckpointStore, MemorySource, Pipeline,
    PipelineConfig, PipelineState,
};
use futures::StreamExt;
use proptest::prelude::*;

const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const FROM: &str = "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045";
const TO: &str = "0x00000000000000000000000028c6c06298d514db089934071355e5743bf21d60";

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn amount_word(n: u64) -> Vec<u8> {
    let mut w = vec![0u8; 24];
    w.extend_from_slice(&n.to_be_bytes());
    w
}

fn transfer_log(tx: u32, log_index: u32, amount: u64) -> EvmLog {
    EvmLog {
        address: USDC.to_lowercase(),
        topics: vec![TRANSFER_TOPIC.into(), FROM.into(), TO.into()],
        data: amount_word(amount),
        transaction_hash: format!("0x{tx:064x}"),
        transaction_index: tx,
        log_index,
    }
}

fn block(n: u64, logs: Vec<EvmLog>) -> EvmBlock {
    EvmBlock {
        header: BlockRef::new(n, format!("0x{n:064x}"), 1_705_000_000 + n as i64 * 12),
        transactions: vec![],
        logs,
    }
}

/// Blocks `from..to`, one transfer per block whose amount is the block number.
fn chain(from: u64, to: u64) -> Vec<EvmBlock> {
    (from..to)
        .map(|n| block(n, vec![transfer_log(0, 0, n)]))
        .collect()
}

type TransferPipeline = Pipeline<MemorySource<EvmBlock>, EvmLogDecoder<Erc20Transfer>>;

fn transfers(
    config: PipelineConfig,
    source: MemorySource<EvmBlock>,
    store: Arc<MemoryCheckpointStore>,
) -> TransferPipeline {
    Pipeline::new(
        config,
        source,
        EvmLogDecoder::erc20_transfers().with_contracts([USDC]),
        store,
    )
}

async fn drain(p: TransferPipeline) -> Vec<u64> {
    p.into_stream()
        .map(|batch| batch.unwrap())
        .flat_map(futures::stream::iter)
        .map(|e| e.block.number)
        .collect()
        .await
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transfer_end_to_end() {
    let source = MemorySource::from_blocks(vec![block(19_000_000, vec![transfer_log(12, 41, 1_000_000_000)])]);
    let mut p = transfers(
        PipelineConfig::new("usdc").from_block(19_000_000),
        source,
        Arc::new(MemoryCheckpointStore::new()),
    );

    let batch = p.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    let e = &batch[0];
    assert_eq!(e.payload.token_address, USDC);
    assert_eq!(e.payload.from, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    assert_eq!(e.payload.to, "0x28C6c06298d514Db089934071355E5743bf21d60");
    assert_eq!(e.payload.amount, U256::from(1_000_000_000u64));
    assert_eq!(e.block.number, 19_000_000);
    assert_eq!(e.transaction.index, 12);
    assert_eq!(e.entry_index, 41);
    assert_eq!(e.timestamp.timestamp(), e.block.timestamp);
    assert_eq!(e.offset, Offset::from(&e.block));

    assert!(p.next_batch().await.unwrap().is_none());
    assert_eq!(p.state(), PipelineState::Completed);
}

#[tokio::test]
async fn query_is_pushed_upstream() {
    let source = Arc::new(MemorySource::<EvmBlock>::new(vec![]));
    let mut p = Pipeline::new(
        PipelineConfig::new("usdc").from_block(100).to_block(200),
        Arc::clone(&source),
        EvmLogDecoder::erc20_transfers().with_contracts([USDC]),
        Arc::new(MemoryCheckpointStore::new()),
    );
    assert!(p.next_batch().await.unwrap().is_none());

    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    let q = &queries[0];
    assert_eq!((q.range.from, q.range.to), (100, Some(200)));
    assert_eq!(q.logs[0].topic0, vec![TRANSFER_TOPIC.to_string()]);
    assert_eq!(q.logs[0].address, vec![USDC.to_string()]);
}

#[tokio::test]
async fn empty_blocks_produce_no_batch() {
    let source = MemorySource::from_blocks(vec![block(1, vec![]), block(2, vec![]), block(3, vec![])]);
    let mut p = transfers(
        PipelineConfig::new("p").from_block(1),
        source,
        Arc::new(MemoryCheckpointStore::new()),
    );
    assert!(p.next_batch().await.unwrap().is_none());
    assert_eq!(p.metrics().blocks_processed, 3);
    assert_eq!(p.metrics().batches_emitted, 0);
}

#[tokio::test]
async fn bounded_range_completes() {
    let source = MemorySource::from_blocks(chain(10, 30));
    let p = transfers(
        PipelineConfig::new("p").from_block(12).to_block(15),
        source,
        Arc::new(MemoryCheckpointStore::new()),
    );
    assert_eq!(drain(p).await, vec![12, 13, 14]);
}

#[tokio::test]
async fn resume_does_not_re_emit() {
    let store = Arc::new(MemoryCheckpointStore::new());

    // First run: take two batches, then stop pulling.
    let mut first = transfers(
        PipelineConfig::new("usdc").from_block(0),
        MemorySource::from_blocks(chain(0, 6)),
        Arc::clone(&store),
    );
    let a = first.next_batch().await.unwrap().unwrap();
    let b = first.next_batch().await.unwrap().unwrap();
    assert_eq!((a[0].block.number, b[0].block.number), (0, 1));
    // Only the first batch has been acknowledged by a later pull.
    assert_eq!(store.load("usdc").await.unwrap(), Some(Offset::from(&a[0].block)));
    drop(first);

    // Second run: batch 1 is re-delivered (at-least-once), batch 0 is not.
    let second = transfers(
        PipelineConfig::new("usdc").from_block(0),
        MemorySource::from_blocks(chain(0, 6)),
        Arc::clone(&store),
    );
    assert_eq!(drain(second).await, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.load("usdc").await.unwrap().unwrap().number, 5);
}

#[tokio::test]
async fn explicit_offset_wins_over_checkpoint() {
    let store = Arc::new(MemoryCheckpointStore::with_offset("usdc", Offset::new(1, "x")));
    let p = transfers(
        PipelineConfig::new("usdc"),
        MemorySource::from_blocks(chain(0, 6)),
        store,
    )
    .with_offset(Offset::new(3, "y"));
    assert_eq!(drain(p).await, vec![4, 5]);
}

#[tokio::test]
async fn source_ignoring_range_is_still_skipped() {
    // A source that replays blocks the pipeline already delivered.
    struct Replay(Vec<EvmBlock>);

    #[async_trait::async_trait]
    impl chainpipe_stream::BlockSource for Replay {
        type Block = EvmBlock;
        async fn stream(
            &self,
            _query: chainpipe_core::query::DataQuery,
        ) -> Result<chainpipe_stream::BlockStream<EvmBlock>, StreamError> {
            let batches: Vec<Result<Vec<EvmBlock>, StreamError>> =
                self.0.iter().cloned().map(|b| Ok(vec![b])).collect();
            Ok(Box::pin(futures::stream::iter(batches)))
        }
    }

    let mut blocks = chain(0, 4);
    blocks.push(block(2, vec![transfer_log(0, 0, 2)]));
    let store = Arc::new(MemoryCheckpointStore::with_offset("p", Offset::new(0, "h")));
    let p = Pipeline::new(
        PipelineConfig::new("p"),
        Replay(blocks),
        EvmLogDecoder::erc20_transfers(),
        store,
    );
    let numbers: Vec<u64> = p
        .into_stream()
        .flat_map(|b| futures::stream::iter(b.unwrap()))
        .map(|e| e.block.number)
        .collect()
        .await;
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn decode_error_policy() {
    let mut bad = transfer_log(0, 1, 0);
    bad.data.truncate(5);
    let blocks = || vec![block(7, vec![transfer_log(0, 0, 1), bad.clone()])];

    let mut strict = transfers(
        PipelineConfig::new("strict").from_block(0),
        MemorySource::from_blocks(blocks()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    match strict.next_batch().await {
        Err(StreamError::Decode { block_number, entry_index, source, .. }) => {
            assert_eq!((block_number, entry_index), (7, 1));
            assert!(source.is_malformed());
        }
        other => panic!("expected decode error, got {other:?}"),
    }

    let mut lenient = transfers(
        PipelineConfig::new("lenient")
            .from_block(0)
            .on_decode_error(DecodeErrorPolicy::Skip),
        MemorySource::from_blocks(blocks()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    let batch = lenient.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(lenient.metrics().entries_skipped, 1);
}

#[tokio::test]
async fn missing_start_position() {
    let mut p = transfers(
        PipelineConfig::new("p"),
        MemorySource::from_blocks(chain(0, 2)),
        Arc::new(MemoryCheckpointStore::new()),
    );
    assert!(matches!(p.next_batch().await, Err(StreamError::CheckpointUnavailable)));
}

// ─── Properties ───────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Offsets never go backwards and every block with a transfer is
    /// delivered exactly once, however the source batches them.
    #[test]
    fn offsets_monotonic(
        sizes in prop::collection::vec(1usize..4, 1..8),
        empty in prop::collection::vec(any::<bool>(), 32),
    ) {
        let mut n = 0u64;
        let mut batches = Vec::new();
        for size in sizes {
            let mut batch = Vec::new();
            for _ in 0..size {
                let logs = if empty[n as usize % empty.len()] { vec![] } else { vec![transfer_log(0, 0, n)] };
                batch.push(block(n, logs));
                n += 1;
            }
            batches.push(batch);
        }
        let expected: Vec<u64> = (0..n).filter(|i| !empty[*i as usize % empty.len()]).collect();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let offsets: Vec<Offset> = rt.block_on(async {
            let p = transfers(
                PipelineConfig::new("p").from_block(0),
                MemorySource::new(batches),
                Arc::new(MemoryCheckpointStore::new()),
            );
            p.into_stream()
                .flat_map(|b| futures::stream::iter(b.unwrap()))
                .map(|e| e.offset)
                .collect()
                .await
        });
        prop_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        let numbers: Vec<u64> = offsets.iter().map(|o| o.number).collect();
        prop_assert_eq!(numbers, expected);
    }
}
