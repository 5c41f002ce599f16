//! Stream offset — the resumption token handed to consumers.
//!
//! An offset identifies the last fully processed block. It is persisted by
//! the consumer and supplied back to resume a stream right after that block.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::block::BlockRef;

/// Position of a processed block.
///
/// Ordered by block number; the hash only breaks ties so that `Ord` stays
/// consistent with `Eq`. Serialized as the opaque string `"<number>:<hash>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Offset {
    /// Last processed block number.
    pub number: u64,
    /// Last processed block hash.
    pub hash: String,
}

impl Offset {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    /// The first block a stream resumed from this offset should request.
    pub fn next_block(&self) -> u64 {
        self.number.saturating_add(1)
    }

    /// Returns `true` if `block_number` was already covered by this offset.
    pub fn covers(&self, block_number: u64) -> bool {
        block_number <= self.number
    }
}

impl From<&BlockRef> for Offset {
    fn from(block: &BlockRef) -> Self {
        Self::new(block.number, block.hash.clone())
    }
}

impl Ord for Offset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Offset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.number, self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid offset '{input}': {reason}")]
pub struct OffsetParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for Offset {
    type Err = OffsetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| OffsetParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (number, hash) = s.split_once(':').ok_or_else(|| err("missing ':' separator"))?;
        let number = number
            .parse::<u64>()
            .map_err(|e| err(&format!("block number: {e}")))?;
        Ok(Self::new(number, hash))
    }
}

impl From<Offset> for String {
    fn from(offset: Offset) -> Self {
        offset.to_string()
    }
}

impl TryFrom<String> for Offset {
    type Error = OffsetParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
