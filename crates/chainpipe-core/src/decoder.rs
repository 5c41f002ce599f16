//! The protocol decoder traits.
//!
//! Two levels of decoding exist:
//! - `EntryDecoder` knows one event/instruction kind: it recognizes an entry
//!   by its signature (`matches`) and turns its payload bytes into typed
//!   fields (`decode`).
//! - `BlockDecoder` walks a whole raw block, runs the matching utilities, and
//!   dispatches candidate entries to the right `EntryDecoder`.
//!
//! Both traits are object-safe apart from their associated types, so a
//! stream can hold `Arc<dyn EntryDecoder<EvmLog, Output = P>>` tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::{DecodeError, StreamError};
use crate::event::TxRef;
use crate::query::DataQuery;

/// Marker that distinguishes one protocol entry kind from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Signature {
    /// EVM event topic: keccak256 of the canonical ABI signature, `0x`-hex.
    Topic(String),
    /// Leading bytes of Solana instruction or account data.
    Discriminator(#[serde(with = "crate::serde_hex")] Vec<u8>),
}

impl Signature {
    /// `0x`-prefixed hex form, as used in source filters.
    pub fn as_hex(&self) -> String {
        match self {
            Signature::Topic(t) => t.to_ascii_lowercase(),
            Signature::Discriminator(d) => format!("0x{}", hex::encode(d)),
        }
    }

    /// Returns `true` if `data` starts with this discriminator.
    /// Topics never match raw data.
    pub fn prefixes(&self, data: &[u8]) -> bool {
        match self {
            Signature::Topic(_) => false,
            Signature::Discriminator(d) => data.starts_with(d),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

/// Decoder for a single protocol event or instruction kind.
pub trait EntryDecoder<E: ?Sized>: Send + Sync {
    type Output;

    /// Human-readable name, e.g. `"Transfer"`.
    fn name(&self) -> &str;

    fn signature(&self) -> &Signature;

    /// Returns `true` if `entry` carries this decoder's signature.
    fn matches(&self, entry: &E) -> bool;

    /// Decode the entry payload.
    ///
    /// Only valid for entries where `matches` returned `true`; the result
    /// for any other entry is unspecified.
    fn decode(&self, entry: &E) -> Result<Self::Output, DecodeError>;
}

/// A decoded entry that still lacks block provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<P> {
    pub payload: P,
    pub transaction: TxRef,
    pub entry_index: u32,
}

/// A matched entry whose payload failed to decode.
#[derive(Debug)]
pub struct EntryFailure {
    pub decoder: String,
    pub tx_index: u32,
    pub entry_index: u32,
    pub error: DecodeError,
}

impl EntryFailure {
    pub fn into_stream_error(self, block_number: u64) -> StreamError {
        StreamError::Decode {
            block_number,
            tx_index: self.tx_index,
            entry_index: self.entry_index,
            source: self.error,
        }
    }
}

pub type EntryResult<P> = Result<Decoded<P>, EntryFailure>;

/// Turns raw blocks of one chain family into decoded protocol entries.
///
/// Per-entry decode failures are returned inside the vector so the pipeline
/// can apply its error policy; structural problems with the block itself
/// (such as a missing transaction) fail the whole call.
pub trait BlockDecoder: Send + Sync {
    type Block: Block;
    type Payload: Send;

    fn name(&self) -> &str;

    /// Filters and field selection to push upstream. The pipeline fills in
    /// the block range.
    fn query(&self) -> DataQuery;

    /// Decode all matching entries of `block` in source order.
    fn decode_block(
        &self,
        block: &Self::Block,
    ) -> Result<Vec<EntryResult<Self::Payload>>, StreamError>;
}
