//! `WhirlpoolSwapDecoder` — Whirlpool swaps with their token movements.
//!
//! A swap instruction only carries the requested amount; the amounts that
//! actually moved are in the two SPL Token transfers the Whirlpool program
//! invokes one level below the swap: user → vault first, vault → user second.

use std::sync::Arc;

use chainpipe_core::{
    block::{SolanaBlock, SolanaInstruction},
    chain::ChainFamily,
    decoder::{BlockDecoder, Decoded, EntryDecoder, EntryFailure, EntryResult},
    error::{DecodeError, StreamError},
    event::TxRef,
    query::{DataQuery, FieldSelection, InstructionFilter},
};
use serde::{Deserialize, Serialize};

use super::instructions::{SwapArgs, SwapDecoder, SwapVersion, PROGRAM_ID};
use super::types;
use crate::instruction::{inner_instructions_where, instruction_balances, transaction_signature};
use crate::token::{self, TokenTransfer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhirlpoolSwap {
    pub instruction: SwapVersion,
    pub whirlpool: String,
    pub authority: String,
    pub args: SwapArgs,
    /// Tokens paid into the pool.
    pub input: TokenTransfer,
    /// Tokens paid out of the pool.
    pub output: TokenTransfer,
}

pub struct WhirlpoolSwapDecoder {
    decoders: [SwapDecoder; 2],
}

impl WhirlpoolSwapDecoder {
    pub fn new() -> Result<Self, DecodeError> {
        let types = Arc::new(types::schema_set()?);
        Ok(Self {
            decoders: [
                SwapDecoder::with_types(SwapVersion::V1, Arc::clone(&types))?,
                SwapDecoder::with_types(SwapVersion::V2, types)?,
            ],
        })
    }

    fn decoder_for(&self, ins: &SolanaInstruction) -> Option<&SwapDecoder> {
        self.decoders.iter().find(|d| d.matches(ins))
    }

    fn decode_swap(
        &self,
        decoder: &SwapDecoder,
        ins: &SolanaInstruction,
        block: &SolanaBlock,
    ) -> Result<WhirlpoolSwap, DecodeError> {
        let swap = decoder.decode(ins)?;
        let inner = inner_instructions_where(ins, &block.instructions, 1, |i| {
            token::is_token_program(&i.program_id)
        });
        let mut transfers = inner
            .into_iter()
            .filter_map(token::decode_transfer)
            .collect::<Result<Vec<_>, DecodeError>>()?;
        if transfers.len() < 2 {
            return Err(DecodeError::MissingField {
                field: format!("token transfers ({} of 2)", transfers.len()),
            });
        }
        let balances = instruction_balances(block, ins.transaction_index);
        for t in transfers.iter_mut() {
            t.resolve_mint(&balances);
        }
        let mut transfers = transfers.into_iter();
        let (Some(input), Some(output)) = (transfers.next(), transfers.next()) else {
            return Err(DecodeError::malformed("swap without transfers"));
        };
        Ok(WhirlpoolSwap {
            instruction: swap.version,
            whirlpool: swap.accounts.whirlpool,
            authority: swap.accounts.token_authority,
            args: swap.args,
            input,
            output,
        })
    }
}

impl BlockDecoder for WhirlpoolSwapDecoder {
    type Block = SolanaBlock;
    type Payload = WhirlpoolSwap;

    fn name(&self) -> &str {
        "orca-whirlpool-swaps"
    }

    fn query(&self) -> DataQuery {
        let fields = FieldSelection::default()
            .with_block_header()
            .with_transaction(&["transactionIndex", "signatures"])
            .with_instruction(&[
                "transactionIndex",
                "instructionAddress",
                "programId",
                "accounts",
                "data",
            ])
            .with_token_balance(&[
                "transactionIndex",
                "account",
                "preMint",
                "postMint",
                "preOwner",
                "postOwner",
                "preAmount",
                "postAmount",
            ]);
        let filter = InstructionFilter {
            program_id: vec![PROGRAM_ID.to_string()],
            d8: self
                .decoders
                .iter()
                .map(|d| d.signature().as_hex())
                .collect(),
            inner_instructions: true,
            transaction: true,
            transaction_token_balances: true,
            ..Default::default()
        };
        DataQuery::new(ChainFamily::Solana, fields).instruction(filter)
    }

    fn decode_block(&self, block: &SolanaBlock) -> Result<Vec<EntryResult<WhirlpoolSwap>>, StreamError> {
        let mut swaps: Vec<(&SolanaInstruction, &SwapDecoder)> = block
            .instructions
            .iter()
            .filter_map(|ins| self.decoder_for(ins).map(|d| (ins, d)))
            .collect();
        swaps.sort_by(|(a, _), (b, _)| {
            (a.transaction_index, &a.instruction_address)
                .cmp(&(b.transaction_index, &b.instruction_address))
        });

        let mut out = Vec::with_capacity(swaps.len());
        for (ordinal, (ins, decoder)) in swaps.into_iter().enumerate() {
            let entry_index = ordinal as u32;
            let entry = match self.decode_swap(decoder, ins, block) {
                Ok(payload) => Ok(Decoded {
                    payload,
                    transaction: TxRef::new(
                        transaction_signature(block, ins.transaction_index)?,
                        ins.transaction_index,
                    ),
                    entry_index,
                }),
                Err(error) => Err(EntryFailure {
                    decoder: decoder.name().to_string(),
                    tx_index: ins.transaction_index,
                    entry_index,
                    error,
                }),
            };
            out.push(entry);
        }
        Ok(out)
    }
}
