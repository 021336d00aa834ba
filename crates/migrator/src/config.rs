use std::collections::BTreeMap;

use ethereum_types::H160;

use crate::{
    amount::DEFAULT_FALLBACK_BPS,
    ledger::Address,
    retry::RetryPolicy,
};

pub const OLD_PRIMARY_CHEF: Address = H160([
    0x77, 0x34, 0x1b, 0xf3, 0x14, 0x72, 0xe9, 0xc8, 0x96, 0xf3, 0x6f, 0x4a, 0x44, 0x8f, 0xdf, 0x57,
    0x3a, 0x0d, 0x9b, 0x60,
]);
pub const NEW_PRIMARY_CHEF: Address = H160([
    0x19, 0x29, 0x23, 0xa6, 0x19, 0xfc, 0x6a, 0xbf, 0x1c, 0x17, 0xfe, 0xbc, 0x0d, 0x9d, 0x1c, 0x9b,
    0xee, 0x3a, 0x02, 0xa5,
]);
pub const OLD_SECONDARY_CHEF: Address = H160([
    0x9f, 0x68, 0xbc, 0xe0, 0x58, 0x90, 0x1d, 0x35, 0x83, 0xa1, 0x22, 0x88, 0x9b, 0xe2, 0x7a, 0x4d,
    0x2f, 0x55, 0xb6, 0x56,
]);
pub const NEW_SECONDARY_CHEF: Address = H160([
    0x26, 0xa6, 0x32, 0x0c, 0xa8, 0x5e, 0xe9, 0x81, 0xdc, 0xf3, 0x9a, 0xd7, 0x7a, 0x87, 0xed, 0xff,
    0x46, 0x4f, 0x00, 0xdf,
]);

/// Lower bound applied to the claim pair reserves, 99%.
pub const DEFAULT_SLIPPAGE_BPS: u64 = 9_900;
/// Pool whose pair prices the aggregated reward claim.
pub const DEFAULT_CLAIM_LP_PID: u64 = 22;
/// Old secondary pool 22 was re-created as pool 54 on the new chef.
pub const DEFAULT_DEPOSIT_REMAP: [(u64, u64); 1] = [(22, 54)];
pub const DEFAULT_TIME_LOCKED_KINDS: [u8; 2] = [4, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub old_primary_chef: Address,
    pub new_primary_chef: Address,
    pub old_secondary_chef: Address,
    pub new_secondary_chef: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            old_primary_chef: OLD_PRIMARY_CHEF,
            new_primary_chef: NEW_PRIMARY_CHEF,
            old_secondary_chef: OLD_SECONDARY_CHEF,
            new_secondary_chef: NEW_SECONDARY_CHEF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub contracts: ContractAddresses,
    pub retry: RetryPolicy,
    /// Share of the staked amount assumed withdrawn when the receipt has no usable event.
    pub fallback_bps: u64,
    pub slippage_bps: u64,
    pub claim_lp_pid: u64,
    /// Old secondary pid -> new secondary pid, for pools that moved.
    pub deposit_remap: BTreeMap<u64, u64>,
    /// Secondary pool kinds gated on the account's unlock time.
    pub time_locked_kinds: Vec<u8>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            contracts: ContractAddresses::default(),
            retry: RetryPolicy::default(),
            fallback_bps: DEFAULT_FALLBACK_BPS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            claim_lp_pid: DEFAULT_CLAIM_LP_PID,
            deposit_remap: DEFAULT_DEPOSIT_REMAP.into_iter().collect(),
            time_locked_kinds: DEFAULT_TIME_LOCKED_KINDS.to_vec(),
        }
    }
}

impl MigrationConfig {
    pub fn deposit_target(&self, pid: u64) -> u64 {
        self.deposit_remap.get(&pid).copied().unwrap_or(pid)
    }

    pub fn is_time_locked(&self, kind_code: u8) -> bool {
        self.time_locked_kinds.contains(&kind_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaps_only_configured_pools() {
        let config = MigrationConfig::default();

        assert_eq!(config.deposit_target(22), 54);
        assert_eq!(config.deposit_target(21), 21);
        assert_eq!(config.deposit_target(54), 54);
    }

    #[test]
    fn default_addresses_match_deployed_chefs() {
        let contracts = ContractAddresses::default();

        assert_eq!(
            format!("{:#x}", contracts.old_primary_chef),
            "0x77341bf31472e9c896f36f4a448fdf573a0d9b60"
        );
        assert_eq!(
            format!("{:#x}", contracts.new_secondary_chef),
            "0x26a6320ca85ee981dcf39ad77a87edff464f00df"
        );
    }
}
