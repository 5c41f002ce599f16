//! SPL Token program transfers.
//!
//! Token instructions carry a one-byte tag followed by packed arguments:
//! - `Transfer` (3): `amount: u64`; accounts `[source, destination, authority]`
//! - `TransferChecked` (12): `amount: u64, decimals: u8`; accounts
//!   `[source, mint, destination, authority]`

use chainpipe_codec::{packed, Schema, SchemaSet};
use chainpipe_core::{
    block::{SolanaInstruction, TokenBalance},
    decoder::{EntryDecoder, Signature},
    error::DecodeError,
};
use serde::{Deserialize, Serialize};

pub const PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
/// Token-2022 keeps the instruction layout of the original program.
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

pub const TRANSFER_TAG: u8 = 3;
pub const TRANSFER_CHECKED_TAG: u8 = 12;

pub fn is_token_program(program_id: &str) -> bool {
    program_id == PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub source: String,
    pub destination: String,
    pub authority: String,
    /// Only `TransferChecked` names the mint; for plain transfers it is
    /// filled from the transaction's token balances when known.
    pub mint: Option<String>,
    pub amount: u64,
    pub decimals: Option<u8>,
}

impl TokenTransfer {
    /// Fill a missing mint from the balance record of the source or
    /// destination account, preferring the post-transaction mint.
    pub fn resolve_mint(&mut self, balances: &[&TokenBalance]) {
        if self.mint.is_some() {
            return;
        }
        self.mint = balances
            .iter()
            .filter(|b| b.account == self.source || b.account == self.destination)
            .find_map(|b| b.post_mint.clone().or_else(|| b.pre_mint.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Transfer,
    TransferChecked,
}

impl TransferKind {
    pub fn tag(&self) -> u8 {
        match self {
            TransferKind::Transfer => TRANSFER_TAG,
            TransferKind::TransferChecked => TRANSFER_CHECKED_TAG,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransferKind::Transfer => "Transfer",
            TransferKind::TransferChecked => "TransferChecked",
        }
    }

    fn args(&self) -> Schema {
        match self {
            TransferKind::Transfer => Schema::structure([("amount", Schema::U64)]),
            TransferKind::TransferChecked => {
                Schema::structure([("amount", Schema::U64), ("decimals", Schema::U8)])
            }
        }
    }

    fn account_count(&self) -> usize {
        match self {
            TransferKind::Transfer => 3,
            TransferKind::TransferChecked => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenTransferDecoder {
    kind: TransferKind,
    signature: Signature,
    args: Schema,
    set: SchemaSet,
}

impl TokenTransferDecoder {
    pub fn new(kind: TransferKind) -> Self {
        Self {
            kind,
            signature: Signature::Discriminator(vec![kind.tag()]),
            args: kind.args(),
            set: SchemaSet::new(),
        }
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }
}

/// Decoders for both transfer instructions.
pub fn transfer_decoders() -> [TokenTransferDecoder; 2] {
    [
        TokenTransferDecoder::new(TransferKind::Transfer),
        TokenTransferDecoder::new(TransferKind::TransferChecked),
    ]
}

/// Decode `ins` if it is a token transfer of either kind.
pub fn decode_transfer(ins: &SolanaInstruction) -> Option<Result<TokenTransfer, DecodeError>> {
    transfer_decoders()
        .iter()
        .find(|d| d.matches(ins))
        .map(|d| d.decode(ins))
}

impl EntryDecoder<SolanaInstruction> for TokenTransferDecoder {
    type Output = TokenTransfer;

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn matches(&self, ins: &SolanaInstruction) -> bool {
        is_token_program(&ins.program_id) && self.signature.prefixes(&ins.data)
    }

    fn decode(&self, ins: &SolanaInstruction) -> Result<TokenTransfer, DecodeError> {
        let args = packed::decode_exact(&self.set, &self.args, ins.data.get(1..).unwrap_or_default())?;
        if ins.accounts.len() < self.kind.account_count() {
            return Err(DecodeError::malformed(format!(
                "{} needs {} accounts, got {}",
                self.kind.name(),
                self.kind.account_count(),
                ins.accounts.len()
            )));
        }
        let a = &ins.accounts;
        let amount = args.field("amount")?.to_u64()?;
        Ok(match self.kind {
            TransferKind::Transfer => TokenTransfer {
                source: a[0].clone(),
                destination: a[1].clone(),
                authority: a[2].clone(),
                mint: None,
                amount,
                decimals: None,
            },
            TransferKind::TransferChecked => TokenTransfer {
                source: a[0].clone(),
                mint: Some(a[1].clone()),
                destination: a[2].clone(),
                authority: a[3].clone(),
                amount,
                decimals: Some(args.field("decimals")?.to_u8()?),
            },
        })
    }
}
