//! Uniswap V3 pool `Swap` event.
//!
//! ```text
//! Swap(address indexed sender, address indexed recipient,
//!      int256 amount0, int256 amount1, uint160 sqrtPriceX96,
//!      uint128 liquidity, int24 tick)
//! ```

use alloy_primitives::{I256, U256};
use chainpipe_codec::Schema;
use chainpipe_core::{
    block::EvmLog,
    decoder::{EntryDecoder, Signature},
    error::DecodeError,
};
use serde::{Deserialize, Serialize};

use crate::event::{checksum_address, EventParam, EventSignature};

pub const SWAP_SIGNATURE: &str = "Swap(address,address,int256,int256,uint160,uint128,int24)";
pub const SWAP_TOPIC: &str = "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniswapV3Swap {
    pub sender: String,
    pub recipient: String,
    /// The emitting pool contract.
    pub pool: String,
    pub liquidity: u128,
    pub tick: i32,
    /// Token0 delta from the pool's point of view; negative leaves the pool.
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
}

#[derive(Debug, Clone)]
pub struct UniswapV3SwapDecoder {
    event: EventSignature,
}

impl UniswapV3SwapDecoder {
    pub fn new() -> Self {
        Self {
            event: EventSignature::from_parts(
                "Swap",
                SWAP_SIGNATURE,
                vec![
                    EventParam::indexed("sender", Schema::EVM_ADDRESS),
                    EventParam::indexed("recipient", Schema::EVM_ADDRESS),
                    EventParam::data("amount0", Schema::I256),
                    EventParam::data("amount1", Schema::I256),
                    EventParam::data("sqrtPriceX96", Schema::Uint(160)),
                    EventParam::data("liquidity", Schema::U128),
                    EventParam::data("tick", Schema::Int(24)),
                ],
            ),
        }
    }

    pub fn event(&self) -> &EventSignature {
        &self.event
    }
}

impl Default for UniswapV3SwapDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryDecoder<EvmLog> for UniswapV3SwapDecoder {
    type Output = UniswapV3Swap;

    fn name(&self) -> &str {
        self.event.name()
    }

    fn signature(&self) -> &Signature {
        self.event.signature()
    }

    fn matches(&self, log: &EvmLog) -> bool {
        self.event.matches(log)
    }

    fn decode(&self, log: &EvmLog) -> Result<UniswapV3Swap, DecodeError> {
        let v = self.event.decode(log)?;
        Ok(UniswapV3Swap {
            sender: v.field("sender")?.as_address()?.to_string(),
            recipient: v.field("recipient")?.as_address()?.to_string(),
            pool: checksum_address(&log.address)?,
            liquidity: v.field("liquidity")?.to_u128()?,
            tick: v.field("tick")?.to_i32()?,
            amount0: v.field("amount0")?.as_int()?,
            amount1: v.field("amount1")?.as_int()?,
            sqrt_price_x96: v.field("sqrtPriceX96")?.as_uint()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_codec::{abi, SchemaSet, Value};

    fn swap_log() -> EvmLog {
        let data_schema = Schema::structure([
            ("amount0", Schema::I256),
            ("amount1", Schema::I256),
            ("sqrtPriceX96", Schema::Uint(160)),
            ("liquidity", Schema::U128),
            ("tick", Schema::Int(24)),
        ]);
        let data = abi::encode_params(
            &SchemaSet::new(),
            &data_schema,
            &Value::structure([
                ("amount0", Value::int(-5_000_000_000)),
                ("amount1", Value::int(2_000_000_000_000_000_000)),
                ("sqrtPriceX96", Value::uint(79_228_162_514_264_337_593_543_950_336)),
                ("liquidity", Value::uint(18_000_000_000_000_000)),
                ("tick", Value::int(-195_000)),
            ]),
        )
        .unwrap();
        EvmLog {
            address: "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640".into(),
            topics: vec![
                SWAP_TOPIC.into(),
                "0x000000000000000000000000e592427a0aece92de3edee1f18e0157c05861564".into(),
                "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045".into(),
            ],
            data,
            transaction_hash: "0xfeed".into(),
            transaction_index: 1,
            log_index: 3,
        }
    }

    #[test]
    fn topic_matches_signature_hash() {
        assert_eq!(UniswapV3SwapDecoder::new().signature().as_hex(), SWAP_TOPIC);
    }

    #[test]
    fn decodes_swap() {
        let d = UniswapV3SwapDecoder::new();
        let log = swap_log();
        assert!(d.matches(&log));
        let s = d.decode(&log).unwrap();
        assert_eq!(s.sender, "0xE592427A0AEce92De3Edee1F18E0157C05861564");
        assert_eq!(s.recipient, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(s.pool, "0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640");
        assert_eq!(s.tick, -195_000);
        assert_eq!(s.liquidity, 18_000_000_000_000_000);
        assert!(s.amount0.is_negative());
        assert_eq!(s.amount1.to_string(), "2000000000000000000");
        assert_eq!(s.sqrt_price_x96, U256::from(79_228_162_514_264_337_593_543_950_336u128));
    }

    #[test]
    fn transfer_log_is_not_a_swap() {
        let d = UniswapV3SwapDecoder::new();
        let mut log = swap_log();
        log.topics[0] = crate::erc20::TRANSFER_TOPIC.into();
        assert!(!d.matches(&log));
    }
}
