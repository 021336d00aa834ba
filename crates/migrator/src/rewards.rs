use tracing::{error, info};

use crate::{
    amount::scale_bps,
    context::MigrationContext,
    error::MigrationError,
    ledger::{H256, LedgerCall, U256},
    outcome::ClaimStatus,
};

/// Rewards queued during a pass, claimed together at its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimBatch {
    entries: Vec<(u64, U256)>,
}

impl ClaimBatch {
    /// Queues a reward. Zero amounts are ignored.
    pub fn push(&mut self, pid: u64, amount: U256) {
        if !amount.is_zero() {
            self.entries.push((pid, amount));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn pids(&self) -> Vec<u64> {
        self.entries.iter().map(|(pid, _)| *pid).collect()
    }

    pub fn amounts(&self) -> Vec<U256> {
        self.entries.iter().map(|(_, amount)| *amount).collect()
    }

    pub fn total(&self) -> U256 {
        self.entries
            .iter()
            .fold(U256::zero(), |total, (_, amount)| total.saturating_add(*amount))
    }
}

/// `[r0 * bps / 10_000, r0, r1 * bps / 10_000, r1]`, the reserve bounds the
/// claim accepts.
pub fn claim_reserve_bounds(reserve0: U256, reserve1: U256, slippage_bps: u64) -> [U256; 4] {
    [
        scale_bps(reserve0, slippage_bps),
        reserve0,
        scale_bps(reserve1, slippage_bps),
        reserve1,
    ]
}

#[derive(Debug, Default)]
pub(crate) struct RewardAggregator {
    batch: ClaimBatch,
}

impl RewardAggregator {
    /// Queues the live and residual reward of a position, returning the
    /// queued amount if there was any.
    pub async fn collect(
        &mut self,
        ctx: &MigrationContext<'_>,
        pid: u64,
    ) -> Result<Option<U256>, MigrationError> {
        let chef = ctx.config.contracts.old_secondary_chef;
        let pending = ctx
            .read(|| ctx.ledger.pending_reward(chef, pid, ctx.account))
            .await?;
        let position = ctx
            .read(|| ctx.ledger.secondary_position(chef, pid, ctx.account))
            .await?;

        let reward = pending.saturating_add(position.reward);
        if reward.is_zero() {
            return Ok(None);
        }
        info!(pid, %pending, residual = %position.reward, %reward, "Queued reward for claim");
        self.batch.push(pid, reward);
        Ok(Some(reward))
    }

    /// Issues the single aggregated claim. A failed claim is reported, never raised.
    pub async fn settle(self, ctx: &MigrationContext<'_>) -> ClaimStatus {
        if self.batch.is_empty() {
            info!("No rewards to claim");
            return ClaimStatus::NothingToClaim;
        }

        let total = self.batch.total();
        match self.claim(ctx).await {
            Ok(tx_hash) => {
                info!(positions = self.batch.len(), %total, "Rewards claimed");
                ClaimStatus::Claimed {
                    tx_hash,
                    positions: self.batch.len(),
                    total,
                }
            }
            Err(err) => {
                error!(positions = self.batch.len(), %total, error = %err, "Reward claim failed");
                ClaimStatus::Failed(err)
            }
        }
    }

    async fn claim(&self, ctx: &MigrationContext<'_>) -> Result<H256, MigrationError> {
        let chef = ctx.config.contracts.old_secondary_chef;
        let pair = ctx.read(|| ctx.ledger.claim_pair(chef)).await?;
        let (reserve0, reserve1) = ctx.read(|| ctx.ledger.pair_reserves(pair)).await?;

        let receipt = ctx
            .executor()
            .send(LedgerCall::SafeClaim {
                chef,
                min_reserves: claim_reserve_bounds(reserve0, reserve1, ctx.config.slippage_bps),
                pids: self.batch.pids(),
                amounts: self.batch.amounts(),
                lp_pid: ctx.config.claim_lp_pid,
                account: ctx.account,
            })
            .await?;
        Ok(receipt.tx_hash)
    }
}
