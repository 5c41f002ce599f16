//! Chain-native address encodings.

use alloy_primitives::Address;
use chainpipe_core::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Which address flavour a schema node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    /// 20-byte EVM address, rendered EIP-55 checksummed.
    Evm,
    /// 32-byte Solana public key, rendered base58.
    Pubkey,
}

impl AddressKind {
    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        match self {
            AddressKind::Evm => 20,
            AddressKind::Pubkey => 32,
        }
    }

    /// Render raw address bytes in canonical text form.
    pub fn format(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        if bytes.len() != self.width() {
            return Err(DecodeError::malformed(format!(
                "{self:?} address needs {} bytes, got {}",
                self.width(),
                bytes.len()
            )));
        }
        Ok(match self {
            AddressKind::Evm => Address::from_slice(bytes).to_checksum(None),
            AddressKind::Pubkey => bs58::encode(bytes).into_string(),
        })
    }

    /// Parse canonical text back into raw bytes.
    pub fn parse(&self, text: &str) -> Result<Vec<u8>, DecodeError> {
        let bytes = match self {
            AddressKind::Evm => text
                .parse::<Address>()
                .map(|a| a.to_vec())
                .map_err(|e| DecodeError::TypeMismatch {
                    expected: "evm address".into(),
                    got: format!("'{text}': {e}"),
                })?,
            AddressKind::Pubkey => bs58::decode(text)
                .into_vec()
                .map_err(|e| DecodeError::TypeMismatch {
                    expected: "base58 pubkey".into(),
                    got: format!("'{text}': {e}"),
                })?,
        };
        if bytes.len() != self.width() {
            return Err(DecodeError::TypeMismatch {
                expected: format!("{}-byte address", self.width()),
                got: format!("{} bytes", bytes.len()),
            });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_address_is_checksummed() {
        let raw = hex::decode("d8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        let s = AddressKind::Evm.format(&raw).unwrap();
        assert_eq!(s, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(AddressKind::Evm.parse(&s).unwrap(), raw);
    }

    #[test]
    fn pubkey_is_base58() {
        let s = AddressKind::Pubkey.format(&[0u8; 32]).unwrap();
        assert_eq!(s, "11111111111111111111111111111111");
        assert_eq!(AddressKind::Pubkey.parse(&s).unwrap(), vec![0u8; 32]);
    }

    #[test]
    fn wrong_width_is_rejected() {
        assert!(AddressKind::Pubkey.format(&[1, 2, 3]).is_err());
        assert!(AddressKind::Pubkey.parse("1111").is_err());
    }
}
