//! ERC-20 `Transfer(address indexed from, address indexed to, uint256 value)`.

use alloy_primitives::U256;
use chainpipe_codec::Schema;
use chainpipe_core::{
    block::EvmLog,
    decoder::{EntryDecoder, Signature},
    error::DecodeError,
};
use serde::{Deserialize, Serialize};

use crate::event::{checksum_address, EventParam, EventSignature};

pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";
pub const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// A fungible token transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Transfer {
    pub from: String,
    pub to: String,
    pub amount: U256,
    /// The emitting token contract.
    pub token_address: String,
}

#[derive(Debug, Clone)]
pub struct Erc20TransferDecoder {
    event: EventSignature,
}

impl Erc20TransferDecoder {
    pub fn new() -> Self {
        Self {
            event: EventSignature::from_parts(
                "Transfer",
                TRANSFER_SIGNATURE,
                vec![
                    EventParam::indexed("from", Schema::EVM_ADDRESS),
                    EventParam::indexed("to", Schema::EVM_ADDRESS),
                    EventParam::data("value", Schema::U256),
                ],
            ),
        }
    }

    pub fn event(&self) -> &EventSignature {
        &self.event
    }
}

impl Default for Erc20TransferDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryDecoder<EvmLog> for Erc20TransferDecoder {
    type Output = Erc20Transfer;

    fn name(&self) -> &str {
        self.event.name()
    }

    fn signature(&self) -> &Signature {
        self.event.signature()
    }

    fn matches(&self, log: &EvmLog) -> bool {
        self.event.matches(log)
    }

    fn decode(&self, log: &EvmLog) -> Result<Erc20Transfer, DecodeError> {
        let v = self.event.decode(log)?;
        Ok(Erc20Transfer {
            from: v.field("from")?.as_address()?.to_string(),
            to: v.field("to")?.as_address()?.to_string(),
            amount: v.field("value")?.as_uint()?,
            token_address: checksum_address(&log.address)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc_transfer(data: Vec<u8>) -> EvmLog {
        EvmLog {
            address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            topics: vec![
                TRANSFER_TOPIC.into(),
                "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045".into(),
                "0x00000000000000000000000028c6c06298d514db089934071355e5743bf21d60".into(),
            ],
            data,
            transaction_hash: "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060".into(),
            transaction_index: 4,
            log_index: 17,
        }
    }

    fn word(n: u64) -> Vec<u8> {
        let mut w = vec![0u8; 24];
        w.extend_from_slice(&n.to_be_bytes());
        w
    }

    #[test]
    fn topic_matches_signature_hash() {
        let d = Erc20TransferDecoder::new();
        assert_eq!(d.signature().as_hex(), TRANSFER_TOPIC);
    }

    #[test]
    fn decodes_usdc_transfer() {
        let d = Erc20TransferDecoder::new();
        let log = usdc_transfer(word(1_000_000_000));
        assert!(d.matches(&log));
        let t = d.decode(&log).unwrap();
        assert_eq!(t.from, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(t.to, "0x28C6c06298d514Db089934071355E5743bf21d60");
        assert_eq!(t.amount, U256::from(1_000_000_000u64));
        assert_eq!(t.token_address, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    }

    #[test]
    fn other_topic_does_not_match() {
        let d = Erc20TransferDecoder::new();
        let mut log = usdc_transfer(word(1));
        log.topics[0] = "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925".into();
        assert!(!d.matches(&log));
    }

    #[test]
    fn short_data_is_malformed() {
        let d = Erc20TransferDecoder::new();
        let err = d.decode(&usdc_transfer(vec![0u8; 8])).unwrap_err();
        assert!(err.is_malformed());
    }
}
