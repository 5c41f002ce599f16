//! Source query — what the pipeline asks the upstream block source for.
//!
//! Filters are pushed upstream so the source only ships blocks that can
//! produce events; the decoders still re-check every entry.

use serde::{Deserialize, Serialize};

use crate::chain::ChainFamily;

// ─── BlockRange ───────────────────────────────────────────────────────────────

/// Half-open block range: `from` inclusive, `to` exclusive.
/// `to = None` streams until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

impl BlockRange {
    pub fn new(from: u64, to: Option<u64>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, block_number: u64) -> bool {
        block_number >= self.from && self.to.map_or(true, |to| block_number < to)
    }

    /// Returns `true` if the range cannot contain any block.
    pub fn is_empty(&self) -> bool {
        self.to.is_some_and(|to| to <= self.from)
    }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// EVM log filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Only logs from these contract addresses (empty = all addresses).
    #[serde(default)]
    pub address: Vec<String>,
    /// Only logs with one of these topic[0] values (empty = all events).
    #[serde(default)]
    pub topic0: Vec<String>,
}

impl LogFilter {
    /// Add a topic0 filter (event signature hash).
    pub fn topic0(mut self, topic: impl Into<String>) -> Self {
        self.topic0.push(topic.into());
        self
    }

    /// Restrict to the given contract addresses.
    pub fn addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.address.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if `address` matches this filter.
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.is_empty() || self.address.iter().any(|a| a.eq_ignore_ascii_case(address))
    }

    /// Returns `true` if `topic0` matches this filter.
    pub fn matches_topic0(&self, topic0: &str) -> bool {
        self.topic0.is_empty() || self.topic0.iter().any(|t| t.eq_ignore_ascii_case(topic0))
    }
}

/// Solana instruction filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionFilter {
    #[serde(default)]
    pub program_id: Vec<String>,
    /// Hex of the first data byte, `0x`-prefixed.
    #[serde(default)]
    pub d1: Vec<String>,
    /// Hex of the first eight data bytes, `0x`-prefixed.
    #[serde(default)]
    pub d8: Vec<String>,
    /// Also ship the instructions invoked by matching ones.
    #[serde(default)]
    pub inner_instructions: bool,
    /// Also ship the enclosing transaction.
    #[serde(default)]
    pub transaction: bool,
    /// Also ship token balance records of the enclosing transaction.
    #[serde(default)]
    pub transaction_token_balances: bool,
}

// ─── Field selection ──────────────────────────────────────────────────────────

/// Which fields the source should populate per entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    #[serde(default)]
    pub block: Vec<String>,
    #[serde(default)]
    pub transaction: Vec<String>,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default)]
    pub instruction: Vec<String>,
    #[serde(default)]
    pub token_balance: Vec<String>,
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

impl FieldSelection {
    /// Header fields every stream needs for provenance.
    pub fn with_block_header(mut self) -> Self {
        self.block = owned(&["number", "hash", "timestamp"]);
        self
    }

    pub fn with_transaction(mut self, fields: &[&str]) -> Self {
        self.transaction = owned(fields);
        self
    }

    pub fn with_log(mut self, fields: &[&str]) -> Self {
        self.log = owned(fields);
        self
    }

    pub fn with_instruction(mut self, fields: &[&str]) -> Self {
        self.instruction = owned(fields);
        self
    }

    pub fn with_token_balance(mut self, fields: &[&str]) -> Self {
        self.token_balance = owned(fields);
        self
    }
}

// ─── DataQuery ────────────────────────────────────────────────────────────────

/// A complete request to the block source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    #[serde(rename = "type")]
    pub kind: ChainFamily,
    #[serde(flatten)]
    pub range: BlockRange,
    pub fields: FieldSelection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<InstructionFilter>,
}

impl DataQuery {
    pub fn new(kind: ChainFamily, fields: FieldSelection) -> Self {
        Self {
            kind,
            range: BlockRange::new(0, None),
            fields,
            logs: vec![],
            instructions: vec![],
        }
    }

    pub fn with_range(mut self, range: BlockRange) -> Self {
        self.range = range;
        self
    }

    pub fn log(mut self, filter: LogFilter) -> Self {
        self.logs.push(filter);
        self
    }

    pub fn instruction(mut self, filter: InstructionFilter) -> Self {
        self.instructions.push(filter);
        self
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_range_half_open() {
        let r = BlockRange::new(10, Some(12));
        assert!(r.contains(10));
        assert!(r.contains(11));
        assert!(!r.contains(12));
        assert!(!r.is_empty());
        assert!(BlockRange::new(5, Some(5)).is_empty());
        assert!(BlockRange::new(5, None).contains(u64::MAX));
    }

    #[test]
    fn log_filter_matches_address() {
        let f = LogFilter::default().addresses(["0xAbCdEf"]);
        assert!(f.matches_address("0xabcdef")); // case-insensitive
        assert!(!f.matches_address("0x111111"));
    }

    #[test]
    fn log_filter_empty_matches_all() {
        let f = LogFilter::default();
        assert!(f.matches_address("0xanything"));
        assert!(f.matches_topic0("0xanything"));
    }

    #[test]
    fn query_serializes_portal_shape() {
        let q = DataQuery::new(ChainFamily::Evm, FieldSelection::default().with_block_header())
            .with_range(BlockRange::new(100, Some(200)))
            .log(LogFilter::default().topic0("0xddf2"));
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "evm");
        assert_eq!(json["from"], 100);
        assert_eq!(json["to"], 200);
        assert_eq!(json["logs"][0]["topic0"][0], "0xddf2");
        assert!(json.get("instructions").is_none());
    }
}
