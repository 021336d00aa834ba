use crate::ledger::{H256, LedgerError};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Failed to read pool count: {0}")]
    Setup(#[source] LedgerError),
    #[error("Ledger read failed: {0}")]
    Read(#[from] LedgerError),
    #[error("Failed to submit transaction: {0}")]
    Submit(#[source] LedgerError),
    #[error("Transaction {tx_hash:#x} was not confirmed: {source}")]
    Unconfirmed {
        tx_hash: H256,
        #[source]
        source: LedgerError,
    },
    #[error("Transaction {tx_hash:#x} reverted")]
    TransactionReverted { tx_hash: H256 },
}

impl MigrationError {
    /// Whether re-running the migration later may get past this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Read(_) | Self::Submit(_) | Self::Setup(_) | Self::Unconfirmed { .. }
        )
    }
}
