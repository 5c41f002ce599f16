//! Whirlpool account decoding by discriminator.

use std::sync::Arc;

use chainpipe_codec::{packed, SchemaSet, Value};
use chainpipe_core::error::DecodeError;
use serde::{Deserialize, Serialize};

use super::types::{self, ACCOUNTS};
use crate::discriminator;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAccount {
    pub name: &'static str,
    pub value: Value,
}

/// Pool state fields most consumers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhirlpoolState {
    pub whirlpools_config: String,
    pub tick_spacing: u16,
    pub fee_rate: u16,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub token_mint_a: String,
    pub token_vault_a: String,
    pub token_mint_b: String,
    pub token_vault_b: String,
}

impl WhirlpoolState {
    fn from_value(v: &Value) -> Result<Self, DecodeError> {
        Ok(Self {
            whirlpools_config: v.field("whirlpoolsConfig")?.as_address()?.to_string(),
            tick_spacing: v.field("tickSpacing")?.to_u16()?,
            fee_rate: v.field("feeRate")?.to_u16()?,
            liquidity: v.field("liquidity")?.to_u128()?,
            sqrt_price: v.field("sqrtPrice")?.to_u128()?,
            tick_current_index: v.field("tickCurrentIndex")?.to_i32()?,
            token_mint_a: v.field("tokenMintA")?.as_address()?.to_string(),
            token_vault_a: v.field("tokenVaultA")?.as_address()?.to_string(),
            token_mint_b: v.field("tokenMintB")?.as_address()?.to_string(),
            token_vault_b: v.field("tokenVaultB")?.as_address()?.to_string(),
        })
    }
}

/// Recognizes every Whirlpool account type by its 8-byte prefix.
#[derive(Debug, Clone)]
pub struct AccountDecoder {
    types: Arc<SchemaSet>,
    known: Vec<([u8; discriminator::LEN], &'static str)>,
}

impl AccountDecoder {
    pub fn new() -> Result<Self, DecodeError> {
        Ok(Self::with_types(Arc::new(types::schema_set()?)))
    }

    pub fn with_types(types: Arc<SchemaSet>) -> Self {
        let known = ACCOUNTS
            .iter()
            .map(|name| (discriminator::account(name), *name))
            .collect();
        Self { types, known }
    }

    /// Account type name for `data`, if its discriminator is known.
    pub fn account_name(&self, data: &[u8]) -> Option<&'static str> {
        let prefix = data.get(..discriminator::LEN)?;
        self.known
            .iter()
            .find(|(d, _)| d.as_slice() == prefix)
            .map(|(_, name)| *name)
    }

    /// Decode account data, discriminator included.
    ///
    /// Allocated account space may exceed the layout, so trailing bytes
    /// are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedAccount, DecodeError> {
        let name = self.account_name(data).ok_or_else(|| {
            DecodeError::malformed(format!(
                "unknown account discriminator 0x{}",
                hex::encode(&data[..data.len().min(discriminator::LEN)])
            ))
        })?;
        let schema = self.types.by_name(name)?;
        let (value, _) = packed::decode_prefix(&self.types, schema, &data[discriminator::LEN..])?;
        Ok(DecodedAccount { name, value })
    }

    pub fn decode_whirlpool(&self, data: &[u8]) -> Result<WhirlpoolState, DecodeError> {
        let account = self.decode(data)?;
        if account.name != "Whirlpool" {
            return Err(DecodeError::TypeMismatch {
                expected: "Whirlpool".into(),
                got: account.name.into(),
            });
        }
        WhirlpoolState::from_value(&account.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_codec::AddressKind;

    fn key(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    /// A Whirlpool account image with the given price and tick.
    fn whirlpool_account(sqrt_price: u128, tick: i32) -> Vec<u8> {
        let mut d = discriminator::account("Whirlpool").to_vec();
        d.extend(key(1)); // config
        d.push(255); // bump
        d.extend(64u16.to_le_bytes());
        d.extend(64u16.to_le_bytes()); // seed
        d.extend(3000u16.to_le_bytes());
        d.extend(300u16.to_le_bytes());
        d.extend(1_000_000u128.to_le_bytes());
        d.extend(sqrt_price.to_le_bytes());
        d.extend(tick.to_le_bytes());
        d.extend(0u64.to_le_bytes());
        d.extend(0u64.to_le_bytes());
        d.extend(key(2)); // mint a
        d.extend(key(3)); // vault a
        d.extend(0u128.to_le_bytes());
        d.extend(key(4)); // mint b
        d.extend(key(5)); // vault b
        d.extend(0u128.to_le_bytes());
        d.extend(0u64.to_le_bytes());
        d.extend(vec![0u8; 3 * 128]);
        d
    }

    #[test]
    fn decodes_whirlpool_state() {
        let dec = AccountDecoder::new().unwrap();
        let data = whirlpool_account(1 << 64, -18_000);
        assert_eq!(data.len(), 653);
        assert_eq!(dec.account_name(&data), Some("Whirlpool"));

        let state = dec.decode_whirlpool(&data).unwrap();
        assert_eq!(state.sqrt_price, 1 << 64);
        assert_eq!(state.tick_current_index, -18_000);
        assert_eq!(state.fee_rate, 3000);
        assert_eq!(state.token_mint_a, AddressKind::Pubkey.format(&key(2)).unwrap());
        assert_eq!(state.token_vault_b, AddressKind::Pubkey.format(&key(5)).unwrap());
    }

    #[test]
    fn trailing_space_is_ignored() {
        let dec = AccountDecoder::new().unwrap();
        let mut data = whirlpool_account(1, 0);
        data.extend([0u8; 16]);
        assert_eq!(dec.decode(&data).unwrap().name, "Whirlpool");
    }

    #[test]
    fn fee_tier_account() {
        let dec = AccountDecoder::new().unwrap();
        let mut data = discriminator::account("FeeTier").to_vec();
        data.extend(key(9));
        data.extend(128u16.to_le_bytes());
        data.extend(10_000u16.to_le_bytes());
        let acc = dec.decode(&data).unwrap();
        assert_eq!(acc.name, "FeeTier");
        assert_eq!(acc.value.field("defaultFeeRate").unwrap().to_u16().unwrap(), 10_000);
        assert!(matches!(
            dec.decode_whirlpool(&data),
            Err(DecodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unknown_or_truncated_accounts_are_malformed() {
        let dec = AccountDecoder::new().unwrap();
        assert!(dec.decode(&[0u8; 40]).unwrap_err().is_malformed());
        assert!(dec.decode(&[1, 2]).unwrap_err().is_malformed());

        let short = &whirlpool_account(1, 0)[..100];
        assert!(dec.decode(short).unwrap_err().is_malformed());
    }
}
