//! # stream_demo
//!
//! Streams USDC transfers from an in-memory block source, stops half way,
//! and resumes from the saved checkpoint without re-delivering anything
//! that was acknowledged.
//!
//! Run with:
//! ```sh
//! cargo run --bin stream_demo
//!
//! # With JSON logging and pipeline debug output:
//! LOG_JSON=1 RUST_LOG=info,chainpipe_stream=debug cargo run --bin stream_demo
//! ```

use std::sync::Arc;

use anyhow::Result;
use chainpipe_core::block::{BlockRef, EvmBlock, EvmLog};
use chainpipe_evm::{erc20::TRANSFER_TOPIC, EvmLogDecoder};
use chainpipe_observability::{init_tracing, LogConfig};
use chainpipe_stream::{
    CheckpointStore, MemoryCheckpointStore, MemorySource, Pipeline, PipelineConfig,
};
use futures::StreamExt;
use tracing::info;

const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const FIRST_BLOCK: u64 = 19_000_000;

fn topic(address_hex: &str) -> String {
    format!("0x{:0>64}", address_hex.trim_start_matches("0x").to_lowercase())
}

/// A small synthetic chain: one USDC transfer every other block.
fn blocks() -> Vec<EvmBlock> {
    (0..10u64)
        .map(|i| {
            let number = FIRST_BLOCK + i;
            let logs = if i % 2 == 0 {
                let mut data = vec![0u8; 24];
                data.extend_from_slice(&((i + 1) * 1_000_000).to_be_bytes());
                vec![EvmLog {
                    address: USDC.to_lowercase(),
                    topics: vec![
                        TRANSFER_TOPIC.into(),
                        topic("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"),
                        topic("0x28c6c06298d514db089934071355e5743bf21d60"),
                    ],
                    data,
                    transaction_hash: format!("0x{number:064x}"),
                    transaction_index: 0,
                    log_index: 0,
                }]
            } else {
                vec![]
            };
            EvmBlock {
                header: BlockRef::new(number, format!("0x{:064x}", number * 7), 1_705_173_443 + i as i64 * 12),
                transactions: vec![],
                logs,
            }
        })
        .collect()
}

fn pipeline(store: Arc<MemoryCheckpointStore>) -> Pipeline<MemorySource<EvmBlock>, EvmLogDecoder<chainpipe_evm::Erc20Transfer>> {
    Pipeline::new(
        PipelineConfig::new("usdc-transfers").from_block(FIRST_BLOCK),
        MemorySource::from_blocks(blocks()),
        EvmLogDecoder::erc20_transfers().with_contracts([USDC]),
        store,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let log = LogConfig::default()
        .component("chainpipe-stream", "info")
        .json(std::env::var("LOG_JSON").is_ok());
    init_tracing(&log)?;

    println!("ChainPipe — resumable USDC transfer stream");
    println!("═══════════════════════════════════════════════════════");

    let store = Arc::new(MemoryCheckpointStore::new());

    // ── 1. First run: take three batches, then cancel ────────────────────────
    let mut first = pipeline(Arc::clone(&store));
    let cancel = first.cancel_handle();
    for _ in 0..3 {
        if let Some(batch) = first.next_batch().await? {
            for e in &batch {
                println!(
                    "  block {:>10}  {} → {}  {} (raw units)",
                    e.block.number, e.payload.from, e.payload.to, e.payload.amount
                );
            }
        }
    }
    cancel.cancel();
    // The pull after cancellation acknowledges the last batch.
    first.next_batch().await?;
    let saved = store.load("usdc-transfers").await?;
    info!(state = ?first.state(), offset = ?saved.as_ref().map(ToString::to_string), "first run stopped");
    println!("\n✓ First run {:?}, checkpoint {}", first.state(), saved.map(|o| o.to_string()).unwrap_or_default());

    // ── 2. Second run: resumes after the checkpoint ──────────────────────────
    let second = pipeline(Arc::clone(&store));
    let mut events = std::pin::pin!(second.into_stream());
    while let Some(batch) = events.next().await {
        for e in batch? {
            println!(
                "  block {:>10}  tx {}  amount {}  offset {}",
                e.block.number, e.transaction.id, e.payload.amount, e.offset
            );
        }
    }

    if let Some(offset) = store.load("usdc-transfers").await? {
        println!("\n✓ Completed, final checkpoint {offset}");
    }
    Ok(())
}
