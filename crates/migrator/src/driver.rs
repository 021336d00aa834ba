use std::sync::Arc;

use tracing::{error, info};

use crate::{
    checkpoint::{CheckpointStore, Subsystem},
    config::MigrationConfig,
    context::{MigrationContext, PositionProgress},
    error::MigrationError,
    ledger::{Address, Ledger},
    outcome::{ClaimStatus, MigrationSummary, PositionOutcome, PositionReport, SubsystemReport},
    primary, secondary,
    rewards::RewardAggregator,
};

/// Migrates every position of an account from the old chefs to the new ones.
///
/// Positions are processed one at a time in ascending pid order. A failing
/// position is reported and the pass moves on; only failing to enumerate the
/// pools aborts a subsystem.
pub struct Migrator {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn CheckpointStore>,
    config: MigrationConfig,
}

impl Migrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn CheckpointStore>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            config,
        }
    }

    fn context(&self, account: Address) -> MigrationContext<'_> {
        MigrationContext {
            ledger: self.ledger.as_ref(),
            store: self.store.as_ref(),
            config: &self.config,
            account,
        }
    }

    pub async fn migrate_primary(&self, account: Address) -> Result<SubsystemReport, MigrationError> {
        let ctx = self.context(account);
        let pool_length = self
            .pool_length(&ctx, Subsystem::Primary, self.config.contracts.old_primary_chef)
            .await?;

        let mut positions = Vec::new();
        for pid in 0..pool_length {
            info!(pid, "Processing primary pool");
            let mut progress = PositionProgress::default();
            let outcome = primary::migrate_position(&ctx, pid, &mut progress).await;
            positions.push(position_report(Subsystem::Primary, pid, outcome, progress));
        }

        info!(account = %format!("{account:#x}"), "Primary chef migration finished");
        Ok(SubsystemReport {
            subsystem: Subsystem::Primary,
            positions,
            claim: ClaimStatus::NothingToClaim,
        })
    }

    pub async fn migrate_secondary(
        &self,
        account: Address,
    ) -> Result<SubsystemReport, MigrationError> {
        let ctx = self.context(account);
        let pool_length = self
            .pool_length(&ctx, Subsystem::Secondary, self.config.contracts.old_secondary_chef)
            .await?;

        let mut rewards = RewardAggregator::default();
        let mut positions = Vec::new();
        for pid in 0..pool_length {
            info!(pid, "Processing secondary pool");
            let mut progress = PositionProgress::default();
            let outcome =
                secondary::migrate_position(&ctx, pid, &mut rewards, &mut progress).await;
            positions.push(position_report(Subsystem::Secondary, pid, outcome, progress));
        }

        let claim = rewards.settle(&ctx).await;
        info!(account = %format!("{account:#x}"), "Secondary chef migration finished");
        Ok(SubsystemReport {
            subsystem: Subsystem::Secondary,
            positions,
            claim,
        })
    }

    /// Runs the primary pass, then the secondary one, each independently of
    /// how the other ended.
    pub async fn migrate_all(&self, account: Address) -> MigrationSummary {
        info!(account = %format!("{account:#x}"), "Starting migration");
        let primary = self.migrate_primary(account).await;
        let secondary = self.migrate_secondary(account).await;
        MigrationSummary { primary, secondary }
    }

    async fn pool_length(
        &self,
        ctx: &MigrationContext<'_>,
        subsystem: Subsystem,
        chef: Address,
    ) -> Result<u64, MigrationError> {
        match ctx.read(|| ctx.ledger.pool_length(chef)).await {
            Ok(pool_length) => {
                info!(%subsystem, pool_length, chef = %format!("{chef:#x}"), "Found pools on old chef");
                Ok(pool_length)
            }
            Err(err) => {
                error!(%subsystem, error = %err, "Could not read pool count, aborting subsystem");
                Err(MigrationError::Setup(err))
            }
        }
    }
}

fn position_report(
    subsystem: Subsystem,
    pid: u64,
    outcome: Result<PositionOutcome, MigrationError>,
    progress: PositionProgress,
) -> PositionReport {
    let outcome = outcome.unwrap_or_else(|err| {
        error!(
            %subsystem,
            pid,
            error = %err,
            "Position migration failed, re-run to resume from the last confirmed step"
        );
        PositionOutcome::Failed(err)
    });
    PositionReport {
        pid,
        outcome,
        recovered: progress.recovered,
        queued_reward: progress.queued_reward,
    }
}
