//! Whirlpool `swap` and `swap_v2` instructions.

use std::sync::Arc;

use chainpipe_codec::{packed, Schema, SchemaSet, Value};
use chainpipe_core::{
    block::SolanaInstruction,
    decoder::{EntryDecoder, Signature},
    error::DecodeError,
};
use serde::{Deserialize, Serialize};

use super::types;
use crate::discriminator;

pub const PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapVersion {
    V1,
    V2,
}

impl SwapVersion {
    pub fn name(&self) -> &'static str {
        match self {
            SwapVersion::V1 => "swap",
            SwapVersion::V2 => "swapV2",
        }
    }

    pub fn discriminator(&self) -> [u8; discriminator::LEN] {
        match self {
            SwapVersion::V1 => discriminator::instruction("swap"),
            SwapVersion::V2 => discriminator::instruction("swap_v2"),
        }
    }

    /// Minimum account list length.
    fn account_count(&self) -> usize {
        match self {
            SwapVersion::V1 => 11,
            SwapVersion::V2 => 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingAccountsSlice {
    pub accounts_type: String,
    pub length: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapArgs {
    pub amount: u64,
    pub other_amount_threshold: u64,
    pub sqrt_price_limit: u128,
    pub amount_specified_is_input: bool,
    pub a_to_b: bool,
    /// `swap_v2` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_accounts: Option<Vec<RemainingAccountsSlice>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapAccounts {
    pub token_authority: String,
    pub whirlpool: String,
    pub token_owner_account_a: String,
    pub token_vault_a: String,
    pub token_owner_account_b: String,
    pub token_vault_b: String,
    /// `swap_v2` names the mints explicitly.
    #[serde(default)]
    pub token_mint_a: Option<String>,
    #[serde(default)]
    pub token_mint_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapInstruction {
    pub version: SwapVersion,
    pub args: SwapArgs,
    pub accounts: SwapAccounts,
}

fn args_schema(version: SwapVersion, set: &SchemaSet) -> Result<Schema, DecodeError> {
    let mut fields = vec![
        ("amount", Schema::U64),
        ("otherAmountThreshold", Schema::U64),
        ("sqrtPriceLimit", Schema::U128),
        ("amountSpecifiedIsInput", Schema::Bool),
        ("aToB", Schema::Bool),
    ];
    if version == SwapVersion::V2 {
        let info = set
            .id("RemainingAccountsInfo")
            .ok_or_else(|| DecodeError::invalid_schema("RemainingAccountsInfo not defined"))?;
        fields.push(("remainingAccountsInfo", Schema::option(Schema::Ref(info))));
    }
    Ok(Schema::structure(fields))
}

fn remaining_accounts(v: &Value) -> Result<Option<Vec<RemainingAccountsSlice>>, DecodeError> {
    let Value::Enum { variant, value } = v else {
        return Err(DecodeError::TypeMismatch {
            expected: "option".into(),
            got: v.kind().into(),
        });
    };
    if variant == "None" {
        return Ok(None);
    }
    value
        .field("slices")?
        .as_array()?
        .iter()
        .map(|s| {
            Ok(RemainingAccountsSlice {
                accounts_type: s.field("accountsType")?.as_variant()?.to_string(),
                length: s.field("length")?.to_u8()?,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()
        .map(Some)
}

/// Decoder for one swap instruction version.
#[derive(Debug, Clone)]
pub struct SwapDecoder {
    version: SwapVersion,
    signature: Signature,
    args: Schema,
    types: Arc<SchemaSet>,
}

impl SwapDecoder {
    pub fn new(version: SwapVersion) -> Result<Self, DecodeError> {
        Self::with_types(version, Arc::new(types::schema_set()?))
    }

    /// Share an already-built Whirlpool type set.
    pub fn with_types(version: SwapVersion, types: Arc<SchemaSet>) -> Result<Self, DecodeError> {
        Ok(Self {
            version,
            signature: Signature::Discriminator(version.discriminator().to_vec()),
            args: args_schema(version, &types)?,
            types,
        })
    }

    pub fn version(&self) -> SwapVersion {
        self.version
    }

    fn accounts(&self, a: &[String]) -> SwapAccounts {
        match self.version {
            SwapVersion::V1 => SwapAccounts {
                token_authority: a[1].clone(),
                whirlpool: a[2].clone(),
                token_owner_account_a: a[3].clone(),
                token_vault_a: a[4].clone(),
                token_owner_account_b: a[5].clone(),
                token_vault_b: a[6].clone(),
                token_mint_a: None,
                token_mint_b: None,
            },
            SwapVersion::V2 => SwapAccounts {
                token_authority: a[3].clone(),
                whirlpool: a[4].clone(),
                token_mint_a: Some(a[5].clone()),
                token_mint_b: Some(a[6].clone()),
                token_owner_account_a: a[7].clone(),
                token_vault_a: a[8].clone(),
                token_owner_account_b: a[9].clone(),
                token_vault_b: a[10].clone(),
            },
        }
    }
}

impl EntryDecoder<SolanaInstruction> for SwapDecoder {
    type Output = SwapInstruction;

    fn name(&self) -> &str {
        self.version.name()
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn matches(&self, ins: &SolanaInstruction) -> bool {
        ins.program_id == PROGRAM_ID && self.signature.prefixes(&ins.data)
    }

    fn decode(&self, ins: &SolanaInstruction) -> Result<SwapInstruction, DecodeError> {
        let payload = ins.data.get(discriminator::LEN..).unwrap_or_default();
        let v = packed::decode_exact(&self.types, &self.args, payload)?;
        if ins.accounts.len() < self.version.account_count() {
            return Err(DecodeError::malformed(format!(
                "{} needs {} accounts, got {}",
                self.version.name(),
                self.version.account_count(),
                ins.accounts.len()
            )));
        }
        let remaining = match self.version {
            SwapVersion::V1 => None,
            SwapVersion::V2 => remaining_accounts(v.field("remainingAccountsInfo")?)?,
        };
        Ok(SwapInstruction {
            version: self.version,
            args: SwapArgs {
                amount: v.field("amount")?.to_u64()?,
                other_amount_threshold: v.field("otherAmountThreshold")?.to_u64()?,
                sqrt_price_limit: v.field("sqrtPriceLimit")?.to_u128()?,
                amount_specified_is_input: v.field("amountSpecifiedIsInput")?.as_bool()?,
                a_to_b: v.field("aToB")?.as_bool()?,
                remaining_accounts: remaining,
            },
            accounts: self.accounts(&ins.accounts),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn swap_data(version: SwapVersion, amount: u64, a_to_b: bool, tail: &[u8]) -> Vec<u8> {
        let mut d = version.discriminator().to_vec();
        d.extend_from_slice(&amount.to_le_bytes());
        d.extend_from_slice(&1u64.to_le_bytes());
        d.extend_from_slice(&4_295_048_016u128.to_le_bytes());
        d.push(1);
        d.push(u8::from(a_to_b));
        d.extend_from_slice(tail);
        d
    }

    pub(crate) fn accounts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("acct{i}")).collect()
    }

    fn ins(data: Vec<u8>, accounts: Vec<String>) -> SolanaInstruction {
        SolanaInstruction {
            transaction_index: 0,
            instruction_address: vec![2],
            program_id: PROGRAM_ID.into(),
            accounts,
            data,
        }
    }

    #[test]
    fn decodes_swap_v1() {
        let d = SwapDecoder::new(SwapVersion::V1).unwrap();
        let i = ins(swap_data(SwapVersion::V1, 1_000, true, &[]), accounts(11));
        assert!(d.matches(&i));
        let s = d.decode(&i).unwrap();
        assert_eq!(s.args.amount, 1_000);
        assert_eq!(s.args.sqrt_price_limit, 4_295_048_016);
        assert!(s.args.amount_specified_is_input);
        assert!(s.args.a_to_b);
        assert_eq!(s.accounts.whirlpool, "acct2");
        assert_eq!(s.accounts.token_vault_b, "acct6");
        assert_eq!(s.args.remaining_accounts, None);
    }

    #[test]
    fn decodes_swap_v2_with_remaining_accounts() {
        let d = SwapDecoder::new(SwapVersion::V2).unwrap();
        // Some(RemainingAccountsInfo { slices: [TransferHookA x 2] })
        let tail = [1, 1, 0, 0, 0, 0, 2];
        let i = ins(swap_data(SwapVersion::V2, 7, false, &tail), accounts(15));
        let s = d.decode(&i).unwrap();
        assert_eq!(s.accounts.whirlpool, "acct4");
        assert_eq!(s.accounts.token_mint_b.as_deref(), Some("acct6"));
        assert_eq!(
            s.args.remaining_accounts,
            Some(vec![RemainingAccountsSlice {
                accounts_type: "TransferHookA".into(),
                length: 2
            }])
        );

        let none = ins(swap_data(SwapVersion::V2, 7, false, &[0]), accounts(15));
        assert_eq!(d.decode(&none).unwrap().args.remaining_accounts, None);
    }

    #[test]
    fn v1_decoder_ignores_v2_data() {
        let d = SwapDecoder::new(SwapVersion::V1).unwrap();
        let i = ins(swap_data(SwapVersion::V2, 7, false, &[0]), accounts(15));
        assert!(!d.matches(&i));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let d = SwapDecoder::new(SwapVersion::V1).unwrap();
        let i = ins(swap_data(SwapVersion::V1, 1, true, &[9]), accounts(11));
        assert!(d.decode(&i).unwrap_err().is_malformed());
    }

    #[test]
    fn short_account_list_is_malformed() {
        let d = SwapDecoder::new(SwapVersion::V1).unwrap();
        let i = ins(swap_data(SwapVersion::V1, 1, true, &[]), accounts(5));
        assert!(d.decode(&i).unwrap_err().is_malformed());
    }
}
