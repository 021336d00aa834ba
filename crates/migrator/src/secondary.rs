//! SousChef position migration.
//!
//! Differs from the primary family in three ways: time-locked pool kinds
//! must have matured before withdrawing, regular pools withdraw through
//! their open redemption slots, and every concluded position queues its
//! outstanding reward for the final batched claim.

use tracing::{debug, info};

use crate::{
    amount::resolve_amount,
    checkpoint::{Checkpoint, CheckpointKey, Subsystem},
    context::{MigrationContext, PositionProgress},
    deposit::{DepositOutcome, deposit_checkpoint},
    error::MigrationError,
    ledger::{LedgerCall, SecondaryPoolKind},
    outcome::{PositionOutcome, SkipReason, Stage},
    redemption::{is_matured, reconcile_regular_ids, redeemable_slots},
    rewards::RewardAggregator,
};

pub(crate) async fn migrate_position(
    ctx: &MigrationContext<'_>,
    pid: u64,
    rewards: &mut RewardAggregator,
    progress: &mut PositionProgress,
) -> Result<PositionOutcome, MigrationError> {
    let old_chef = ctx.config.contracts.old_secondary_chef;
    let new_chef = ctx.config.contracts.new_secondary_chef;
    let key = CheckpointKey::new(Subsystem::Secondary, ctx.account, pid);
    debug!(pid, stage = ?Stage::Start);

    let checkpoint = match ctx.store.get(&key) {
        Some(checkpoint) => {
            info!(pid, amount = %checkpoint.amount, "Found pending migration, resuming without withdrawal");
            debug!(pid, stage = ?Stage::Recovered);
            progress.recovered = true;
            Some(checkpoint)
        }
        None => {
            let position = ctx
                .read(|| ctx.ledger.secondary_position(old_chef, pid, ctx.account))
                .await?;
            let pool = ctx.read(|| ctx.ledger.secondary_pool(old_chef, pid)).await?;

            if ctx.config.is_time_locked(pool.kind.code()) {
                let unlock_time = ctx
                    .read(|| ctx.ledger.unlock_time(old_chef, pid, ctx.account))
                    .await?;
                let now = ctx.read(|| ctx.ledger.chain_time()).await?;
                if !is_matured(unlock_time, now) {
                    info!(pid, unlock_time, now, "Position still locked, skipping");
                    return Ok(PositionOutcome::Skipped(SkipReason::NotMatured));
                }
            }

            if position.deposit.is_zero() {
                None
            } else {
                let regular_ids = if pool.kind == SecondaryPoolKind::Regular {
                    let open = redeemable_slots(ctx, pid).await;
                    match reconcile_regular_ids(pool.redemption_period, open) {
                        Some(ids) => ids,
                        None => {
                            info!(pid, "No regular slot open for redemption, skipping");
                            return Ok(PositionOutcome::Skipped(SkipReason::NoRedeemableSlots));
                        }
                    }
                } else {
                    Vec::new()
                };

                debug!(pid, stage = ?Stage::Withdrawing, staked = %position.deposit);
                let receipt = ctx
                    .executor()
                    .send(LedgerCall::SecondaryWithdraw {
                        chef: old_chef,
                        pid,
                        amount: position.deposit,
                        regular_ids,
                    })
                    .await?;
                let resolved =
                    resolve_amount(&receipt, pid, position.deposit, ctx.config.fallback_bps);
                let checkpoint = Checkpoint {
                    destination_resource: pool.token,
                    amount: resolved.amount,
                };
                ctx.store.set(&key, &checkpoint);
                info!(pid, amount = %checkpoint.amount, source = ?resolved.source, "Withdrawal confirmed, checkpoint saved");
                debug!(pid, stage = ?Stage::Withdrawn);
                Some(checkpoint)
            }
        }
    };

    let mut outcome = PositionOutcome::Skipped(SkipReason::NoFunds);
    if let Some(checkpoint) = checkpoint.filter(|checkpoint| !checkpoint.amount.is_zero()) {
        let target = ctx.config.deposit_target(pid);
        debug!(pid, target, stage = ?Stage::Depositing);

        let new_pool = ctx
            .read(|| ctx.ledger.secondary_pool(new_chef, target))
            .await?;
        if !new_pool.is_active() {
            info!(pid, target, "New pool has no allocation, keeping checkpoint for a later run");
            return Ok(PositionOutcome::Skipped(SkipReason::InactiveDestination));
        }

        outcome = match deposit_checkpoint(ctx, pid, &checkpoint, new_chef, |amount| {
            LedgerCall::SecondaryDeposit {
                chef: new_chef,
                pid: target,
                amount,
            }
        })
        .await?
        {
            DepositOutcome::Deposited(deposited) => PositionOutcome::Completed { deposited },
            DepositOutcome::Dust => PositionOutcome::Skipped(SkipReason::Dust),
        };
    } else {
        info!(pid, "No funds to migrate");
    }

    progress.queued_reward = rewards.collect(ctx, pid).await?;
    ctx.store.clear(&key);
    if matches!(outcome, PositionOutcome::Completed { .. }) {
        debug!(pid, stage = ?Stage::Completed);
    }
    Ok(outcome)
}
