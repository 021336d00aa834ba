use std::future::Future;

use crate::{
    checkpoint::CheckpointStore,
    config::MigrationConfig,
    executor::TransactionExecutor,
    ledger::{Address, Ledger, LedgerError, U256},
};

/// Everything a position migration needs for one pass of one account.
pub(crate) struct MigrationContext<'a> {
    pub ledger: &'a dyn Ledger,
    pub store: &'a dyn CheckpointStore,
    pub config: &'a MigrationConfig,
    pub account: Address,
}

impl<'a> MigrationContext<'a> {
    /// Read-only ledger query under the configured retry policy.
    pub async fn read<T, O, Fut>(&self, operation: O) -> Result<T, LedgerError>
    where
        O: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        self.config.retry.run(operation).await
    }

    pub fn executor(&self) -> TransactionExecutor<'a> {
        TransactionExecutor::new(self.ledger)
    }
}

/// Side results of a position migration that the driver reports alongside the outcome.
#[derive(Debug, Default)]
pub(crate) struct PositionProgress {
    pub recovered: bool,
    pub queued_reward: Option<U256>,
}
