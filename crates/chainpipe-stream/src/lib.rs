//! # chainpipe-stream
//!
//! Resumable, pull-based event streams for ChainPipe.
//!
//! A [`Pipeline`] asks a [`BlockSource`] for raw blocks matching the
//! protocol decoder's query, decodes each block, and hands out event
//! batches tagged with block provenance and an offset. Offsets are saved
//! to a [`CheckpointStore`] so a restarted pipeline continues right after
//! the last delivered block.
//!
//! ## Architecture
//! ```text
//! BlockSource (portal client, in-memory)
//!       │  Vec<Block> batches, ascending
//!       ▼
//! BlockDecoder::decode_block  (match → decode → Decoded<P>)
//!       │
//!       ▼
//! Event<P> { payload, block, transaction, entry_index, offset }
//!       │  non-empty batches, (block, tx, entry) order
//!       ▼
//! consumer: next_batch().await / into_stream()
//!       │  next pull
//!       ▼
//! CheckpointStore::save(offset)
//! ```

pub mod checkpoint;
pub mod config;
pub mod pipeline;
pub mod source;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use config::{DecodeErrorPolicy, PipelineConfig};
pub use pipeline::{CancelHandle, Pipeline, PipelineState, StreamMetrics};
pub use source::{BlockSource, BlockStream, MemorySource};
