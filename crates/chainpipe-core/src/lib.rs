//! # chainpipe-core
//!
//! Core traits, types, and primitives shared across all ChainPipe crates.
//! The codec engine, the per-chain protocol decoders, and the streaming
//! pipeline are all built on top of the interfaces defined here.

pub mod block;
pub mod chain;
pub mod decoder;
pub mod error;
pub mod event;
pub mod offset;
pub mod query;
pub mod serde_hex;

pub use block::{Block, BlockRef};
pub use chain::ChainFamily;
pub use decoder::{BlockDecoder, Decoded, EntryDecoder, EntryFailure, EntryResult, Signature};
pub use error::{DecodeError, StreamError};
pub use event::{Event, TxRef};
pub use offset::Offset;
pub use query::{BlockRange, DataQuery, FieldSelection, InstructionFilter, LogFilter};
