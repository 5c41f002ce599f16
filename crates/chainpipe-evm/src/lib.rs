//! # chainpipe-evm
//!
//! EVM log protocols for ChainPipe.
//! Handles Ethereum, Arbitrum, Base and any EVM-compatible chain.
//!
//! ## Implementation notes
//! - Topics[0] → event signature topic (keccak256)
//! - Topics[1..] → indexed parameters (each 32 bytes, ABI-encoded)
//! - `data` → non-indexed parameters, decoded through the schema tree of
//!   `chainpipe-codec` bridged onto `alloy-core`'s dynamic ABI
//! - Addresses are emitted EIP-55 checksummed

pub mod decoder;
pub mod erc20;
pub mod event;
pub mod fingerprint;
pub mod matcher;
pub mod uniswap;

pub use decoder::{EvmLogDecoder, SharedLogDecoder};
pub use erc20::{Erc20Transfer, Erc20TransferDecoder};
pub use event::{EventParam, EventSignature};
pub use matcher::select_logs;
pub use uniswap::{UniswapV3Swap, UniswapV3SwapDecoder};
