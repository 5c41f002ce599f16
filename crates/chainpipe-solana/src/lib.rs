//! # chainpipe-solana
//!
//! Solana program protocols for ChainPipe.
//!
//! ## Implementation notes
//! - Instructions arrive flat; nesting lives in `instruction_address`
//!   (see [`instruction`])
//! - Anchor programs prefix data with an 8-byte sha256 discriminator,
//!   SPL Token with a 1-byte tag
//! - Payloads are Borsh-style packed little-endian, decoded through the
//!   schema tree of `chainpipe-codec`
//! - Public keys are emitted base58

pub mod discriminator;
pub mod instruction;
pub mod orca;
pub mod token;
pub mod transfers;

pub use instruction::{
    inner_instructions, inner_instructions_where, instruction_balances, instruction_d1,
    instruction_d8, transaction_signature,
};
pub use orca::{AccountDecoder, WhirlpoolSwap, WhirlpoolSwapDecoder};
pub use token::{TokenTransfer, TokenTransferDecoder, TransferKind};
pub use transfers::TokenTransferBlockDecoder;
