//! Raw block model as delivered by the upstream block source.
//!
//! Every raw block carries a header plus, depending on the requested field
//! selection, transactions, logs, instructions, and token balance records.
//! All of it is consumed read-only by the decoders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── BlockRef ─────────────────────────────────────────────────────────────────

/// Block header reference — the provenance attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block number (slot on Solana), monotonic per chain.
    pub number: u64,
    /// Block hash in the chain's native encoding (`0x…` hex, base58).
    pub hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

impl BlockRef {
    pub fn new(number: u64, hash: impl Into<String>, timestamp: i64) -> Self {
        Self {
            number,
            hash: hash.into(),
            timestamp,
        }
    }

    /// Wall-clock instant of the block. Out-of-range timestamps map to the epoch.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }
}

/// Anything the source can deliver as a block.
pub trait Block: Send + Sync {
    fn header(&self) -> &BlockRef;
}

// ─── EVM ──────────────────────────────────────────────────────────────────────

/// A raw EVM log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmLog {
    /// Emitting contract address (`0x…`).
    pub address: String,
    /// `topics[0]` is the event signature hash; the rest are indexed params.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed parameters.
    #[serde(with = "crate::serde_hex")]
    pub data: Vec<u8>,
    pub transaction_hash: String,
    pub transaction_index: u32,
    pub log_index: u32,
}

impl EvmLog {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTransaction {
    pub transaction_index: u32,
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmBlock {
    pub header: BlockRef,
    #[serde(default)]
    pub transactions: Vec<EvmTransaction>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl Block for EvmBlock {
    fn header(&self) -> &BlockRef {
        &self.header
    }
}

// ─── Solana ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTransaction {
    pub transaction_index: u32,
    /// Base58 signatures; the first one identifies the transaction.
    pub signatures: Vec<String>,
}

/// A single (possibly inner) instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaInstruction {
    pub transaction_index: u32,
    /// Nesting path inside the transaction: `[2]` is the third top-level
    /// instruction, `[2, 0]` the first instruction it invoked.
    pub instruction_address: Vec<u32>,
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(with = "crate::serde_hex")]
    pub data: Vec<u8>,
}

/// Token account balance change recorded for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub transaction_index: u32,
    pub account: String,
    #[serde(default)]
    pub pre_mint: Option<String>,
    #[serde(default)]
    pub post_mint: Option<String>,
    #[serde(default)]
    pub pre_owner: Option<String>,
    #[serde(default)]
    pub post_owner: Option<String>,
    #[serde(default)]
    pub pre_amount: Option<u64>,
    #[serde(default)]
    pub post_amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaBlock {
    pub header: BlockRef,
    #[serde(default)]
    pub transactions: Vec<SolanaTransaction>,
    #[serde(default)]
    pub instructions: Vec<SolanaInstruction>,
    #[serde(default)]
    pub token_balances: Vec<TokenBalance>,
}

impl Block for SolanaBlock {
    fn header(&self) -> &BlockRef {
        &self.header
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
