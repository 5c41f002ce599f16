//! EVM event topic computation.
//!
//! The topic of an EVM event is the keccak256 hash of its canonical
//! signature string, e.g.:
//!   keccak256("Swap(address,address,int256,int256,uint160,uint128,int24)")
//!   → 0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67
//!
//! For raw logs, topics[0] IS the topic — we do not need to recompute it.

use chainpipe_core::error::DecodeError;
use tiny_keccak::{Hasher, Keccak};

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    output
}

/// Compute the topic of an event signature string.
/// Input: `"EventName(type1,type2,...)"` — the canonical ABI signature.
pub fn keccak256_signature(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Extract topic0 from a raw log's topic list.
/// Returns `None` if topics is empty or the first topic is malformed.
pub fn from_topics(topics: &[String]) -> Option<&str> {
    let first = topics.first()?;
    let hex = first.strip_prefix("0x").unwrap_or(first);
    if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(first.as_str())
    } else {
        None
    }
}

/// Decode a `0x`-hex topic into its 32 raw bytes.
pub fn topic_bytes(topic: &str) -> Result<[u8; 32], DecodeError> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    let raw = hex::decode(hex).map_err(|e| DecodeError::malformed(format!("invalid topic hex: {e}")))?;
    <[u8; 32]>::try_from(raw.as_slice())
        .map_err(|_| DecodeError::malformed(format!("topic must be 32 bytes, got {}", raw.len())))
}
