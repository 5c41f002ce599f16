//! `TokenTransferBlockDecoder` — every SPL Token transfer in a block,
//! top-level or invoked by another program.

use chainpipe_core::{
    block::{SolanaBlock, SolanaInstruction},
    chain::ChainFamily,
    decoder::{BlockDecoder, Decoded, EntryDecoder, EntryFailure, EntryResult},
    error::StreamError,
    event::TxRef,
    query::{DataQuery, FieldSelection, InstructionFilter},
};

use crate::instruction::{instruction_balances, instruction_d1, transaction_signature};
use crate::token::{self, transfer_decoders, TokenTransfer, TokenTransferDecoder};

pub struct TokenTransferBlockDecoder {
    decoders: [TokenTransferDecoder; 2],
    mints: Vec<String>,
}

impl Default for TokenTransferBlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTransferBlockDecoder {
    pub fn new() -> Self {
        Self {
            decoders: transfer_decoders(),
            mints: Vec::new(),
        }
    }

    /// Only keep transfers of these mints. Empty means any.
    ///
    /// Transfers whose mint cannot be resolved are dropped once a mint
    /// list is set.
    pub fn with_mints<I, S>(mut self, mints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mints.extend(mints.into_iter().map(Into::into));
        self
    }

    fn decoder_for(&self, ins: &SolanaInstruction) -> Option<&TokenTransferDecoder> {
        self.decoders.iter().find(|d| d.matches(ins))
    }

    fn wanted(&self, transfer: &TokenTransfer) -> bool {
        self.mints.is_empty()
            || transfer
                .mint
                .as_ref()
                .is_some_and(|m| self.mints.iter().any(|w| w == m))
    }
}

impl BlockDecoder for TokenTransferBlockDecoder {
    type Block = SolanaBlock;
    type Payload = TokenTransfer;

    fn name(&self) -> &str {
        "spl-token-transfers"
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
            .with_token_balance(&["transactionIndex", "account", "preMint", "postMint"]);
        let filter = InstructionFilter {
            program_id: vec![token::PROGRAM_ID.into(), token::TOKEN_2022_PROGRAM_ID.into()],
            d1: self.decoders.iter().map(|d| d.signature().as_hex()).collect(),
            transaction: true,
            transaction_token_balances: true,
            ..Default::default()
        };
        DataQuery::new(ChainFamily::Solana, fields).instruction(filter)
    }

    fn decode_block(&self, block: &SolanaBlock) -> Result<Vec<EntryResult<TokenTransfer>>, StreamError> {
        let mut candidates: Vec<&SolanaInstruction> = block
            .instructions
            .iter()
            .filter(|ins| token::is_token_program(&ins.program_id))
            .collect();
        candidates.sort_by(|a, b| {
            (a.transaction_index, &a.instruction_address)
                .cmp(&(b.transaction_index, &b.instruction_address))
        });

        let mut out = Vec::new();
        for (ordinal, ins) in candidates.into_iter().enumerate() {
            let entry_index = ordinal as u32;
            let Some(decoder) = self.decoder_for(ins) else {
                continue;
            };
            match decoder.decode(ins) {
                Ok(mut payload) => {
                    payload.resolve_mint(&instruction_balances(block, ins.transaction_index));
                    if !self.wanted(&payload) {
                        continue;
                    }
                    out.push(Ok(Decoded {
                        payload,
                        transaction: TxRef::new(
                            transaction_signature(block, ins.transaction_index)?,
                            ins.transaction_index,
                        ),
                        entry_index,
                    }));
                }
                Err(error) => out.push(Err(EntryFailure {
                    decoder: format!("{}@{}", decoder.name(), instruction_d1(ins)),
                    tx_index: ins.transaction_index,
                    entry_index,
                    error,
                })),
            }
        }
        Ok(out)
    }
}
