//! MasterChef position migration, including VIP ticket pools.

use tracing::{debug, info, warn};

use crate::{
    amount::resolve_amount,
    checkpoint::{Checkpoint, CheckpointKey, Subsystem},
    context::{MigrationContext, PositionProgress},
    deposit::{DepositOutcome, deposit_checkpoint},
    error::MigrationError,
    ledger::{Address, LedgerCall, PrimaryPoolKind, U256},
    outcome::{PositionOutcome, SkipReason, Stage},
};

pub(crate) async fn migrate_position(
    ctx: &MigrationContext<'_>,
    pid: u64,
    progress: &mut PositionProgress,
) -> Result<PositionOutcome, MigrationError> {
    let old_chef = ctx.config.contracts.old_primary_chef;
    let new_chef = ctx.config.contracts.new_primary_chef;
    let key = CheckpointKey::new(Subsystem::Primary, ctx.account, pid);
    debug!(pid, stage = ?Stage::Start);

    let old_pool = ctx.read(|| ctx.ledger.primary_pool(old_chef, pid)).await?;
    let ticket_pool = old_pool.kind == PrimaryPoolKind::Ticket;

    let checkpoint = match ctx.store.get(&key) {
        Some(checkpoint) => {
            info!(pid, amount = %checkpoint.amount, "Found pending migration, resuming without withdrawal");
            debug!(pid, stage = ?Stage::Recovered);
            progress.recovered = true;
            Some(checkpoint)
        }
        None => {
            let staked = ctx
                .read(|| ctx.ledger.primary_staked(old_chef, pid, ctx.account))
                .await?;
            if staked.is_zero() {
                None
            } else {
                debug!(pid, stage = ?Stage::Withdrawing, %staked);
                let receipt = ctx
                    .executor()
                    .send(LedgerCall::PrimaryWithdraw {
                        chef: old_chef,
                        pid,
                        amount: staked,
                    })
                    .await?;
                let resolved = resolve_amount(&receipt, pid, staked, ctx.config.fallback_bps);
                let checkpoint = Checkpoint {
                    destination_resource: old_pool.lp_token,
                    amount: resolved.amount,
                };
                ctx.store.set(&key, &checkpoint);
                info!(pid, amount = %checkpoint.amount, source = ?resolved.source, "Withdrawal confirmed, checkpoint saved");
                debug!(pid, stage = ?Stage::Withdrawn);
                Some(checkpoint)
            }
        }
    };

    let moved_tickets = if ticket_pool {
        migrate_tickets(ctx, pid, old_pool.ticket).await?
    } else {
        0
    };

    let Some(checkpoint) = checkpoint else {
        if moved_tickets == 0 {
            info!(pid, "No funds or tickets to migrate");
            return Ok(PositionOutcome::Skipped(SkipReason::NoFunds));
        }
        debug!(pid, stage = ?Stage::Completed);
        return Ok(PositionOutcome::Completed {
            deposited: U256::zero(),
        });
    };

    if checkpoint.amount.is_zero() {
        ctx.store.clear(&key);
        debug!(pid, stage = ?Stage::Completed);
        return Ok(PositionOutcome::Completed {
            deposited: U256::zero(),
        });
    }

    debug!(pid, stage = ?Stage::Depositing);
    let new_pool = ctx.read(|| ctx.ledger.primary_pool(new_chef, pid)).await?;
    if !new_pool.is_active() {
        info!(pid, "New pool has no allocation, keeping checkpoint for a later run");
        return Ok(PositionOutcome::Skipped(SkipReason::InactiveDestination));
    }

    let outcome = deposit_checkpoint(ctx, pid, &checkpoint, new_chef, |amount| {
        LedgerCall::PrimaryDeposit {
            chef: new_chef,
            pid,
            amount,
        }
    })
    .await?;
    ctx.store.clear(&key);

    Ok(match outcome {
        DepositOutcome::Deposited(deposited) => {
            debug!(pid, stage = ?Stage::Completed);
            PositionOutcome::Completed { deposited }
        }
        DepositOutcome::Dust => PositionOutcome::Skipped(SkipReason::Dust),
    })
}

/// Moves the account's tickets for a VIP pool to the new chef and returns
/// how many were deposited.
async fn migrate_tickets(
    ctx: &MigrationContext<'_>,
    pid: u64,
    ticket: Address,
) -> Result<usize, MigrationError> {
    let old_chef = ctx.config.contracts.old_primary_chef;
    let new_chef = ctx.config.contracts.new_primary_chef;
    let executor = ctx.executor();

    let staked = ctx
        .read(|| ctx.ledger.staked_tickets(old_chef, ctx.account, ticket))
        .await?;
    if !staked.is_empty() {
        info!(pid, count = staked.len(), "Withdrawing staked tickets");
    }
    for ticket_id in staked {
        executor
            .send(LedgerCall::WithdrawTicket {
                chef: old_chef,
                pid,
                ticket_id,
            })
            .await?;
    }

    let owned = ctx
        .read(|| ctx.ledger.owned_tickets(ticket, ctx.account))
        .await?;
    if owned.is_empty() {
        debug!(pid, "Wallet holds no tickets");
        return Ok(0);
    }

    approve_tickets(ctx, pid, ticket, &owned).await?;
    info!(pid, count = owned.len(), "Depositing tickets into new chef");
    executor
        .send(LedgerCall::DepositAllTickets {
            chef: new_chef,
            ticket,
        })
        .await?;
    Ok(owned.len())
}

async fn approve_tickets(
    ctx: &MigrationContext<'_>,
    pid: u64,
    ticket: Address,
    owned: &[U256],
) -> Result<(), MigrationError> {
    let operator = ctx.config.contracts.new_primary_chef;

    if ctx
        .read(|| ctx.ledger.tickets_approved_for_all(ticket, ctx.account, operator))
        .await?
    {
        debug!(pid, "New chef already approved for all tickets");
        return Ok(());
    }

    let mut unapproved = Vec::new();
    for ticket_id in owned {
        let approved = ctx
            .read(|| ctx.ledger.ticket_approved(ticket, *ticket_id))
            .await?;
        if approved != operator {
            unapproved.push(*ticket_id);
        }
    }
    if unapproved.is_empty() {
        return Ok(());
    }

    let executor = ctx.executor();
    match executor
        .send(LedgerCall::SetTicketApprovalForAll { ticket, operator })
        .await
    {
        Ok(_) => info!(pid, "Approved new chef for all tickets"),
        Err(error) => {
            warn!(pid, %error, "Approval for all tickets failed, approving one by one");
            for ticket_id in unapproved {
                if let Err(error) = executor
                    .send(LedgerCall::ApproveTicket {
                        ticket,
                        operator,
                        ticket_id,
                    })
                    .await
                {
                    warn!(pid, %ticket_id, %error, "Failed to approve ticket");
                }
            }
        }
    }
    Ok(())
}
