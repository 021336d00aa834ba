use tracing::{error, info};

use crate::{
    error::MigrationError,
    ledger::{Ledger, LedgerCall, Receipt},
};

/// Single path through which every balance-affecting call is sent.
///
/// Sends are never retried: a failed send is returned to the caller, which
/// abandons the position for this run.
pub struct TransactionExecutor<'a> {
    ledger: &'a dyn Ledger,
}

impl<'a> TransactionExecutor<'a> {
    pub fn new(ledger: &'a dyn Ledger) -> Self {
        Self { ledger }
    }

    pub async fn send(&self, call: LedgerCall) -> Result<Receipt, MigrationError> {
        info!(target_contract = %format!("{:#x}", call.target()), %call, "Sending transaction");

        let tx_hash = self
            .ledger
            .submit(&call)
            .await
            .map_err(MigrationError::Submit)?;
        let receipt = self
            .ledger
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|source| MigrationError::Unconfirmed { tx_hash, source })?;

        if !receipt.status {
            error!(tx_hash = %format!("{tx_hash:#x}"), %call, "Transaction reverted");
            return Err(MigrationError::TransactionReverted { tx_hash });
        }

        info!(tx_hash = %format!("{tx_hash:#x}"), "Transaction included");
        Ok(receipt)
    }
}
