//! Orca Whirlpool concentrated-liquidity program.

pub mod accounts;
pub mod instructions;
pub mod swap;
pub mod types;

pub use accounts::{AccountDecoder, DecodedAccount, WhirlpoolState};
pub use instructions::{
    RemainingAccountsSlice, SwapAccounts, SwapArgs, SwapDecoder, SwapInstruction, SwapVersion,
    PROGRAM_ID,
};
pub use swap::{WhirlpoolSwap, WhirlpoolSwapDecoder};
