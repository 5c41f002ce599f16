//! Canonical event envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockRef;
use crate::decoder::Decoded;
use crate::offset::Offset;

/// Transaction that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef {
    /// Transaction hash (EVM) or first signature (Solana).
    pub id: String,
    /// Position of the transaction inside its block.
    pub index: u32,
}

impl TxRef {
    pub fn new(id: impl Into<String>, index: u32) -> Self {
        Self {
            id: id.into(),
            index,
        }
    }
}

/// A fully decoded event — the primary output of ChainPipe.
///
/// `payload` holds the protocol fields; everything else is provenance taken
/// from the enclosing block and transaction, never from the payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    #[serde(flatten)]
    pub payload: P,
    pub block: BlockRef,
    pub transaction: TxRef,
    /// Log index (EVM) or instruction ordinal within the block (Solana).
    pub entry_index: u32,
    pub timestamp: DateTime<Utc>,
    /// Resumption token of the block this event came from.
    pub offset: Offset,
}

impl<P> Event<P> {
    /// Attach block provenance to a decoded entry.
    pub fn new(decoded: Decoded<P>, block: &BlockRef, offset: Offset) -> Self {
        Self {
            payload: decoded.payload,
            block: block.clone(),
            transaction: decoded.transaction,
            entry_index: decoded.entry_index,
            timestamp: block.datetime(),
            offset,
        }
    }

    /// Ordering key inside a batch: (block, transaction, entry).
    pub fn position(&self) -> (u64, u32, u32) {
        (self.block.number, self.transaction.index, self.entry_index)
    }
}
