//! Anchor discriminators.
//!
//! Anchor prefixes instruction data with the first 8 bytes of
//! `sha256("global:<instruction_name>")` and account data with the first
//! 8 bytes of `sha256("account:<AccountName>")`.

use sha2::{Digest, Sha256};

pub const LEN: usize = 8;

fn sighash(namespace: &str, name: &str) -> [u8; LEN] {
    let hash = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; LEN];
    out.copy_from_slice(&hash[..LEN]);
    out
}

/// Discriminator of the instruction whose Rust handler is `name`
/// (snake_case: `swap_v2`, not the IDL's `swapV2`).
pub fn instruction(name: &str) -> [u8; LEN] {
    sighash("global", name)
}

/// Discriminator of the account type named `name`.
pub fn account(name: &str) -> [u8; LEN] {
    sighash("account", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whirlpool_swap_discriminators() {
        assert_eq!(hex::encode(instruction("swap")), "f8c69e91e17587c8");
        assert_eq!(hex::encode(instruction("swap_v2")), "2b04ed0b1ac91e62");
    }

    #[test]
    fn account_namespace_differs() {
        assert_ne!(account("Whirlpool"), instruction("Whirlpool"));
        assert_eq!(account("Whirlpool").len(), LEN);
    }
}
