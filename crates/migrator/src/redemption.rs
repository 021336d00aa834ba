//! Maturity and redemption-slot rules for secondary pools.
//!
//! Regular pools split a deposit into redemption slots. The old chef reports
//! them as packed values where the low decimal digits hold the slot index:
//! `index = value % 10^10`. The packing is owned by the chef contract, so
//! this decoding must follow it if the contract ever changes.

use tracing::{debug, warn};

use crate::{
    context::MigrationContext,
    ledger::{RegularSlot, U256},
};

pub const REGULAR_SLOT_MODULUS: u64 = 10_000_000_000;

pub fn decode_regular_slot(packed: U256) -> u64 {
    (packed % U256::from(REGULAR_SLOT_MODULUS)).low_u64()
}

/// A time-locked position may leave once its unlock time has been reached.
pub fn is_matured(unlock_time: u64, now: u64) -> bool {
    unlock_time <= now
}

pub fn is_redeemable(slot: &RegularSlot, now: u64) -> bool {
    slot.redemption_start <= now && now <= slot.redemption_end && !slot.amount.is_zero()
}

/// Reconciles the slot ids with the pool's redemption period.
///
/// Pools without a redemption period take no ids at all. Pools with one need
/// at least an open slot, otherwise `None` is returned and the withdrawal
/// must wait for a later run.
pub fn reconcile_regular_ids(redemption_period: U256, ids: Vec<u64>) -> Option<Vec<u64>> {
    if redemption_period.is_zero() {
        return Some(Vec::new());
    }
    (!ids.is_empty()).then_some(ids)
}

/// Slot ids of a regular pool open for redemption right now.
///
/// Never fails: an unreadable list is treated as empty and an unreadable
/// slot is left out.
pub(crate) async fn redeemable_slots(ctx: &MigrationContext<'_>, pid: u64) -> Vec<u64> {
    let chef = ctx.config.contracts.old_secondary_chef;

    let packed = match ctx
        .read(|| ctx.ledger.regular_slots(chef, pid, ctx.account))
        .await
    {
        Ok(packed) => packed,
        Err(error) => {
            warn!(pid, %error, "Could not list regular slots, assuming none");
            return Vec::new();
        }
    };
    let now = match ctx.read(|| ctx.ledger.chain_time()).await {
        Ok(now) => now,
        Err(error) => {
            warn!(pid, %error, "Could not read chain time, assuming no redeemable slots");
            return Vec::new();
        }
    };

    let mut redeemable = Vec::new();
    for slot_id in packed
        .into_iter()
        .map(decode_regular_slot)
        .filter(|slot_id| *slot_id != 0)
    {
        match ctx
            .read(|| ctx.ledger.regular_slot(chef, ctx.account, slot_id))
            .await
        {
            Ok(slot) if is_redeemable(&slot, now) => redeemable.push(slot_id),
            Ok(slot) => debug!(
                pid,
                slot_id,
                start = slot.redemption_start,
                end = slot.redemption_end,
                now,
                "Regular slot not redeemable"
            ),
            Err(error) => warn!(pid, slot_id, %error, "Could not read regular slot, skipping it"),
        }
    }
    redeemable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: u64, end: u64, amount: u64) -> RegularSlot {
        RegularSlot {
            redemption_start: start,
            redemption_end: end,
            amount: U256::from(amount),
        }
    }

    #[test]
    fn decodes_index_from_low_digits() {
        let packed = U256::from(1_700_000_000u64) * U256::from(REGULAR_SLOT_MODULUS)
            + U256::from(42u64);

        assert_eq!(decode_regular_slot(packed), 42);
        assert_eq!(decode_regular_slot(U256::from(7u64)), 7);
        assert_eq!(decode_regular_slot(U256::from(REGULAR_SLOT_MODULUS)), 0);
    }

    #[test]
    fn matures_at_unlock_time() {
        assert!(!is_matured(105, 100));
        assert!(is_matured(100, 100));
        assert!(is_matured(0, 100));
    }

    #[test]
    fn redemption_window_is_inclusive() {
        assert!(is_redeemable(&slot(100, 200, 1), 100));
        assert!(is_redeemable(&slot(100, 200, 1), 200));
        assert!(!is_redeemable(&slot(100, 200, 1), 201));
        assert!(!is_redeemable(&slot(100, 200, 1), 99));
        assert!(!is_redeemable(&slot(100, 200, 0), 150));
    }

    #[test]
    fn ids_follow_redemption_period() {
        assert_eq!(reconcile_regular_ids(U256::zero(), vec![1, 2]), Some(vec![]));
        assert_eq!(reconcile_regular_ids(U256::zero(), vec![]), Some(vec![]));
        assert_eq!(
            reconcile_regular_ids(U256::from(86_400u64), vec![3]),
            Some(vec![3])
        );
        assert_eq!(reconcile_regular_ids(U256::from(86_400u64), vec![]), None);
    }
}
