//! Orca Whirlpool type and account layouts.

use chainpipe_codec::{Schema, SchemaSet};
use chainpipe_core::error::DecodeError;

/// Account types that carry an Anchor discriminator on chain.
pub const ACCOUNTS: [&str; 8] = [
    "Whirlpool",
    "Position",
    "TickArray",
    "FeeTier",
    "WhirlpoolsConfig",
    "WhirlpoolsConfigExtension",
    "PositionBundle",
    "TokenBadge",
];

pub const NUM_REWARDS: usize = 3;
pub const TICK_ARRAY_SIZE: usize = 88;

/// Every Whirlpool type, validated.
///
/// References are declared up front so structs can name types defined
/// later in the list (`RemainingAccountsSlice` → `AccountsType`).
pub fn schema_set() -> Result<SchemaSet, DecodeError> {
    let mut set = SchemaSet::new();
    let position_reward_info = set.declare("PositionRewardInfo");
    let tick = set.declare("Tick");
    let whirlpool_reward_info = set.declare("WhirlpoolRewardInfo");
    let accounts_type = set.declare("AccountsType");
    let remaining_accounts_slice = set.declare("RemainingAccountsSlice");

    // ─── Types ───────────────────────────────────────────────────────────────

    set.define(
        "OpenPositionBumps",
        Schema::structure([("positionBump", Schema::U8)]),
    )?;
    set.define(
        "OpenPositionWithMetadataBumps",
        Schema::structure([("positionBump", Schema::U8), ("metadataBump", Schema::U8)]),
    )?;
    set.define(
        "PositionRewardInfo",
        Schema::structure([("growthInsideCheckpoint", Schema::U128), ("amountOwed", Schema::U64)]),
    )?;
    set.define(
        "Tick",
        Schema::structure([
            ("initialized", Schema::Bool),
            ("liquidityNet", Schema::I128),
            ("liquidityGross", Schema::U128),
            ("feeGrowthOutsideA", Schema::U128),
            ("feeGrowthOutsideB", Schema::U128),
            ("rewardGrowthsOutside", Schema::fixed_array(Schema::U128, NUM_REWARDS)),
        ]),
    )?;
    set.define(
        "WhirlpoolRewardInfo",
        Schema::structure([
            ("mint", Schema::PUBKEY),
            ("vault", Schema::PUBKEY),
            ("authority", Schema::PUBKEY),
            ("emissionsPerSecondX64", Schema::U128),
            ("growthGlobalX64", Schema::U128),
        ]),
    )?;
    set.define(
        "WhirlpoolBumps",
        Schema::structure([("whirlpoolBump", Schema::U8)]),
    )?;
    set.define(
        "RemainingAccountsSlice",
        Schema::structure([
            ("accountsType", Schema::Ref(accounts_type)),
            ("length", Schema::U8),
        ]),
    )?;
    set.define(
        "RemainingAccountsInfo",
        Schema::structure([("slices", Schema::vec(Schema::Ref(remaining_accounts_slice)))]),
    )?;
    set.define("CurrIndex", Schema::unit_enum(["Below", "Inside", "Above"]))?;
    set.define("TickLabel", Schema::unit_enum(["Upper", "Lower"]))?;
    set.define("Direction", Schema::unit_enum(["Left", "Right"]))?;
    set.define(
        "AccountsType",
        Schema::unit_enum([
            "TransferHookA",
            "TransferHookB",
            "TransferHookReward",
            "TransferHookInput",
            "TransferHookIntermediate",
            "TransferHookOutput",
            "SupplementalTickArrays",
            "SupplementalTickArraysOne",
            "SupplementalTickArraysTwo",
        ]),
    )?;

    // ─── Accounts ────────────────────────────────────────────────────────────

    set.define(
        "WhirlpoolsConfigExtension",
        Schema::structure([
            ("whirlpoolsConfig", Schema::PUBKEY),
            ("configExtensionAuthority", Schema::PUBKEY),
            ("tokenBadgeAuthority", Schema::PUBKEY),
        ]),
    )?;
    set.define(
        "WhirlpoolsConfig",
        Schema::structure([
            ("feeAuthority", Schema::PUBKEY),
            ("collectProtocolFeesAuthority", Schema::PUBKEY),
            ("rewardEmissionsSuperAuthority", Schema::PUBKEY),
            ("defaultProtocolFeeRate", Schema::U16),
        ]),
    )?;
    set.define(
        "FeeTier",
        Schema::structure([
            ("whirlpoolsConfig", Schema::PUBKEY),
            ("tickSpacing", Schema::U16),
            ("defaultFeeRate", Schema::U16),
        ]),
    )?;
    set.define(
        "PositionBundle",
        Schema::structure([
            ("positionBundleMint", Schema::PUBKEY),
            ("positionBitmap", Schema::fixed_array(Schema::U8, 32)),
        ]),
    )?;
    set.define(
        "Position",
        Schema::structure([
            ("whirlpool", Schema::PUBKEY),
            ("positionMint", Schema::PUBKEY),
            ("liquidity", Schema::U128),
            ("tickLowerIndex", Schema::I32),
            ("tickUpperIndex", Schema::I32),
            ("feeGrowthCheckpointA", Schema::U128),
            ("feeOwedA", Schema::U64),
            ("feeGrowthCheckpointB", Schema::U128),
            ("feeOwedB", Schema::U64),
            (
                "rewardInfos",
                Schema::fixed_array(Schema::Ref(position_reward_info), NUM_REWARDS),
            ),
        ]),
    )?;
    set.define(
        "TickArray",
        Schema::structure([
            ("startTickIndex", Schema::I32),
            ("ticks", Schema::fixed_array(Schema::Ref(tick), TICK_ARRAY_SIZE)),
            ("whirlpool", Schema::PUBKEY),
        ]),
    )?;
    set.define(
        "TokenBadge",
        Schema::structure([("whirlpoolsConfig", Schema::PUBKEY), ("tokenMint", Schema::PUBKEY)]),
    )?;
    set.define(
        "Whirlpool",
        Schema::structure([
            ("whirlpoolsConfig", Schema::PUBKEY),
            ("whirlpoolBump", Schema::fixed_array(Schema::U8, 1)),
            ("tickSpacing", Schema::U16),
            ("tickSpacingSeed", Schema::fixed_array(Schema::U8, 2)),
            ("feeRate", Schema::U16),
            ("protocolFeeRate", Schema::U16),
            ("liquidity", Schema::U128),
            ("sqrtPrice", Schema::U128),
            ("tickCurrentIndex", Schema::I32),
            ("protocolFeeOwedA", Schema::U64),
            ("protocolFeeOwedB", Schema::U64),
            ("tokenMintA", Schema::PUBKEY),
            ("tokenVaultA", Schema::PUBKEY),
            ("feeGrowthGlobalA", Schema::U128),
            ("tokenMintB", Schema::PUBKEY),
            ("tokenVaultB", Schema::PUBKEY),
            ("feeGrowthGlobalB", Schema::U128),
            ("rewardLastUpdatedTimestamp", Schema::U64),
            (
                "rewardInfos",
                Schema::fixed_array(Schema::Ref(whirlpool_reward_info), NUM_REWARDS),
            ),
        ]),
    )?;

    set.validate()?;
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_codec::packed;

    #[test]
    fn all_types_defined_and_valid() {
        let set = schema_set().unwrap();
        for name in ACCOUNTS {
            assert!(set.by_name(name).is_ok(), "{name} missing");
        }
        for name in ["CurrIndex", "TickLabel", "Direction", "RemainingAccountsInfo", "WhirlpoolBumps"] {
            assert!(set.id(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn fixed_account_sizes() {
        let set = schema_set().unwrap();
        let size = |name: &str| {
            let id = set.id(name).unwrap();
            set.static_size(&Schema::Ref(id)).unwrap()
        };
        // sizes without the 8-byte discriminator
        assert_eq!(size("Whirlpool"), Some(645));
        assert_eq!(size("Position"), Some(208));
        assert_eq!(size("Tick"), Some(113));
        assert_eq!(size("TickArray"), Some(4 + 88 * 113 + 32));
        assert_eq!(size("FeeTier"), Some(36));
        assert_eq!(size("RemainingAccountsInfo"), None);
    }

    #[test]
    fn remaining_accounts_info_decodes() {
        let set = schema_set().unwrap();
        let id = set.id("RemainingAccountsInfo").unwrap();
        let v = packed::decode_exact(&set, &Schema::Ref(id), &[1, 0, 0, 0, 6, 2]).unwrap();
        let slice = &v.field("slices").unwrap().as_array().unwrap()[0];
        assert_eq!(
            slice.field("accountsType").unwrap().as_variant().unwrap(),
            "SupplementalTickArrays"
        );
        assert_eq!(slice.field("length").unwrap().to_u8().unwrap(), 2);
    }

    #[test]
    fn unknown_direction_rejected() {
        let set = schema_set().unwrap();
        let id = set.id("Direction").unwrap();
        assert!(packed::decode_exact(&set, &Schema::Ref(id), &[2]).unwrap_err().is_malformed());
    }
}
