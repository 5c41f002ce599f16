//! Instruction-tree helpers.
//!
//! Solana instructions arrive as a flat list per block. Nesting is encoded
//! in `instruction_address`: `[2]` is the third top-level instruction of a
//! transaction, `[2, 0]` the first instruction it invoked, and so on.

use chainpipe_core::{
    block::{SolanaBlock, SolanaInstruction, TokenBalance},
    error::StreamError,
};

/// Instructions invoked by `parent` exactly `level` calls deep that satisfy
/// `pred`. Candidates must share the parent's transaction and have the
/// parent's address as a strict prefix of their own.
pub fn inner_instructions_where<'a, F>(
    parent: &SolanaInstruction,
    instructions: &'a [SolanaInstruction],
    level: usize,
    pred: F,
) -> Vec<&'a SolanaInstruction>
where
    F: Fn(&SolanaInstruction) -> bool,
{
    let depth = parent.instruction_address.len() + level;
    instructions
        .iter()
        .filter(|inner| {
            inner.transaction_index == parent.transaction_index
                && inner.instruction_address.len() == depth
                && inner.instruction_address.starts_with(&parent.instruction_address)
                && pred(inner)
        })
        .collect()
}

/// Instructions of `program_id` invoked by `parent` exactly `level` calls deep.
pub fn inner_instructions<'a>(
    parent: &SolanaInstruction,
    instructions: &'a [SolanaInstruction],
    level: usize,
    program_id: &str,
) -> Vec<&'a SolanaInstruction> {
    inner_instructions_where(parent, instructions, level, |ins| ins.program_id == program_id)
}

/// First signature of the transaction at `tx_index`.
///
/// A block that ships an instruction without its transaction is incomplete,
/// so a miss is an error rather than `None`.
pub fn transaction_signature(block: &SolanaBlock, tx_index: u32) -> Result<&str, StreamError> {
    block
        .transactions
        .iter()
        .find(|tx| tx.transaction_index == tx_index)
        .and_then(|tx| tx.signatures.first())
        .map(String::as_str)
        .ok_or(StreamError::MissingTransaction {
            block_number: block.header.number,
            tx_index,
        })
}

/// `0x`-hex of the first data byte (SPL Token instruction tag).
/// Empty data yields `"0x"`.
pub fn instruction_d1(ins: &SolanaInstruction) -> String {
    prefix_hex(&ins.data, 1)
}

/// `0x`-hex of the first eight data bytes (Anchor discriminator).
pub fn instruction_d8(ins: &SolanaInstruction) -> String {
    prefix_hex(&ins.data, 8)
}

fn prefix_hex(data: &[u8], n: usize) -> String {
    format!("0x{}", hex::encode(&data[..data.len().min(n)]))
}

/// Token balance records of the transaction at `tx_index`.
pub fn instruction_balances(block: &SolanaBlock, tx_index: u32) -> Vec<&TokenBalance> {
    block
        .token_balances
        .iter()
        .filter(|b| b.transaction_index == tx_index)
        .collect()
}
