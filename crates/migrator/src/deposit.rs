use tracing::{debug, info};

use crate::{
    checkpoint::Checkpoint,
    context::MigrationContext,
    error::MigrationError,
    ledger::{Address, LedgerCall, U256},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepositOutcome {
    Deposited(U256),
    /// The clamped amount was at most one unit.
    Dust,
}

/// Deposits a checkpointed withdrawal into an already validated destination.
///
/// The amount is clamped to the wallet balance so fees and rounding on the
/// way out never make the deposit overdraw. `spender` is the new chef, which
/// gets an unlimited allowance when the current one does not cover the deposit.
pub(crate) async fn deposit_checkpoint(
    ctx: &MigrationContext<'_>,
    pid: u64,
    checkpoint: &Checkpoint,
    spender: Address,
    deposit_call: impl FnOnce(U256) -> LedgerCall,
) -> Result<DepositOutcome, MigrationError> {
    let token = checkpoint.destination_resource;
    let balance = ctx
        .read(|| ctx.ledger.token_balance(token, ctx.account))
        .await?;
    let amount = balance.min(checkpoint.amount);

    if amount <= U256::one() {
        info!(pid, %balance, checkpointed = %checkpoint.amount, "Deposit amount is dust, skipping");
        return Ok(DepositOutcome::Dust);
    }
    info!(
        pid,
        %balance,
        checkpointed = %checkpoint.amount,
        %amount,
        "Depositing into new chef"
    );

    let executor = ctx.executor();
    let allowance = ctx
        .read(|| ctx.ledger.token_allowance(token, ctx.account, spender))
        .await?;
    if allowance < amount {
        info!(pid, %allowance, "Allowance insufficient, approving new chef");
        executor
            .send(LedgerCall::Approve {
                token,
                spender,
                amount: U256::MAX,
            })
            .await?;
    } else {
        debug!(pid, %allowance, "Allowance already covers deposit");
    }

    executor.send(deposit_call(amount)).await?;
    Ok(DepositOutcome::Deposited(amount))
}
