//! # decode_solana
//!
//! Decodes Orca Whirlpool data with the schema tree of `chainpipe-codec`:
//! a pool account recognized by its Anchor discriminator, and a `swap`
//! instruction correlated with the token transfers it invoked.
//!
//! Run with:
//! ```sh
//! cargo run --bin decode_solana
//! ```

use anyhow::{Context, Result};
use chainpipe_core::{
    block::{BlockRef, SolanaBlock, SolanaInstruction, SolanaTransaction},
    decoder::BlockDecoder,
};
use chainpipe_solana::{
    discriminator, instruction_d8,
    orca::{self, AccountDecoder},
    token, WhirlpoolSwapDecoder,
};

fn whirlpool_account() -> Vec<u8> {
    let key = |b: u8| [b; 32];
    let mut d = discriminator::account("Whirlpool").to_vec();
    d.extend(key(1));
    d.push(254);
    d.extend(64u16.to_le_bytes());
    d.extend(64u16.to_le_bytes());
    d.extend(300u16.to_le_bytes());
    d.extend(1300u16.to_le_bytes());
    d.extend(52_613_982_715_u128.to_le_bytes());
    d.extend(7_364_254_938_175_830_000_u128.to_le_bytes());
    d.extend((-18_779i32).to_le_bytes());
    d.extend(0u64.to_le_bytes());
    d.extend(0u64.to_le_bytes());
    d.extend(key(2));
    d.extend(key(3));
    d.extend(0u128.to_le_bytes());
    d.extend(key(4));
    d.extend(key(5));
    d.extend(0u128.to_le_bytes());
    d.extend(1_720_000_000u64.to_le_bytes());
    d.extend([0u8; 3 * 128]);
    d
}

fn swap_block() -> SolanaBlock {
    let mut swap = discriminator::instruction("swap").to_vec();
    swap.extend(1_000_000_000u64.to_le_bytes());
    swap.extend(140_000_000u64.to_le_bytes());
    swap.extend(4_295_048_016u128.to_le_bytes());
    swap.extend([1u8, 1u8]);

    let transfer = |amount: u64| {
        let mut d = vec![token::TRANSFER_TAG];
        d.extend(amount.to_le_bytes());
        d
    };
    let ins = |address: Vec<u32>, program: &str, accounts: &[&str], data: Vec<u8>| SolanaInstruction {
        transaction_index: 0,
        instruction_address: address,
        program_id: program.into(),
        accounts: accounts.iter().map(|a| a.to_string()).collect(),
        data,
    };
    SolanaBlock {
        header: BlockRef::new(279_000_000, "9Lq3oZ2yvmgKqsUqKw4p4WZg5LrQfJbYQrGmXoVb5uN4", 1_720_000_000),
        transactions: vec![SolanaTransaction {
            transaction_index: 0,
            signatures: vec!["5VfYvLZEQbTwE4v1f2yK3NzV6tQpm1GqT1zAunL2zXhk".into()],
        }],
        instructions: vec![
            ins(
                vec![2],
                orca::PROGRAM_ID,
                &[
                    token::PROGRAM_ID, "trader", "pool", "trader-a", "vault-a", "trader-b", "vault-b",
                    "tick-0", "tick-1", "tick-2", "oracle",
                ],
                swap,
            ),
            ins(vec![2, 0], token::PROGRAM_ID, &["trader-a", "vault-a", "trader"], transfer(1_000_000_000)),
            ins(vec![2, 1], token::PROGRAM_ID, &["vault-b", "trader-b", "pool"], transfer(141_250_000)),
        ],
        token_balances: vec![],
    }
}

fn main() -> Result<()> {
    println!("ChainPipe — Orca Whirlpool decoding");
    println!("═══════════════════════════════════════════════════════");

    // ── 1. Account by discriminator ──────────────────────────────────────────
    let accounts = AccountDecoder::new()?;
    let data = whirlpool_account();
    let name = accounts.account_name(&data).context("unknown account")?;
    let pool = accounts.decode_whirlpool(&data)?;
    println!("\nAccount type : {name} ({} bytes)", data.len());
    println!("  tick       : {}", pool.tick_current_index);
    println!("  sqrt price : {}", pool.sqrt_price);
    println!("  fee rate   : {} (hundredths of a bip)", pool.fee_rate);
    println!("  mint A     : {}", pool.token_mint_a);
    println!("  mint B     : {}", pool.token_mint_b);

    // ── 2. Swap with its inner transfers ─────────────────────────────────────
    let block = swap_block();
    println!("\nSwap discriminator: {}", instruction_d8(&block.instructions[0]));
    let decoder = WhirlpoolSwapDecoder::new()?;
    for entry in decoder.decode_block(&block)? {
        let swap = entry.map_err(|f| f.into_stream_error(block.header.number))?;
        println!("\nSwap in tx {}", swap.transaction.id);
        println!("  pool      : {}", swap.payload.whirlpool);
        println!("  a → b     : {}", swap.payload.args.a_to_b);
        println!("  paid in   : {} from {}", swap.payload.input.amount, swap.payload.input.source);
        println!("  paid out  : {} to {}", swap.payload.output.amount, swap.payload.output.destination);
        println!("\n{}", serde_json::to_string_pretty(&swap.payload)?);
    }
    Ok(())
}
