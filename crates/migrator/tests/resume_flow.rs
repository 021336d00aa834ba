#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use chef_migrator::{
    Migrator, PositionOutcome, SqliteCheckpointStore,
    ledger::{PrimaryPoolKind, SecondaryPoolKind},
    open_checkpoint_store,
};
use common::{MockLedger, account, config, contracts, ether};
use tempfile::NamedTempFile;

#[tokio::test]
async fn restart_resumes_from_durable_checkpoint() {
    let temp_file = NamedTempFile::new().expect("temp file");
    let ledger = MockLedger::new();
    ledger.primary_pool(0, PrimaryPoolKind::Standard, ether(10), 100);
    ledger.secondary_pool(3, 3, SecondaryPoolKind::Flexible, ether(7), 100);
    ledger.with(|state| {
        state.rejected_calls.insert("primary_deposit");
        state.rejected_calls.insert("secondary_deposit");
    });

    {
        let store = SqliteCheckpointStore::open(temp_file.path()).expect("open store");
        let migrator = Migrator::new(ledger.clone(), Arc::new(store), config());
        let summary = migrator.migrate_all(account()).await;

        let primary = summary.primary.expect("primary pass");
        assert!(primary.positions[0].outcome.is_failed());
        let secondary = summary.secondary.expect("secondary pass");
        assert_eq!(secondary.failed(), 1);
    }

    let store = SqliteCheckpointStore::open(temp_file.path()).expect("reopen store");
    assert_eq!(store.list().expect("list checkpoints").len(), 2);

    ledger.with(|state| state.rejected_calls.clear());
    let migrator = Migrator::new(ledger.clone(), Arc::new(store), config());
    let summary = migrator.migrate_all(account()).await;

    let primary = summary.primary.expect("primary pass");
    let secondary = summary.secondary.expect("secondary pass");
    assert!(primary.positions[0].recovered);
    assert!(secondary.positions[3].recovered);
    assert!(matches!(
        secondary.positions[3].outcome,
        PositionOutcome::Completed { deposited } if deposited == ether(7)
    ));
    assert_eq!(ledger.submitted_named("primary_withdraw").len(), 1);
    assert_eq!(ledger.submitted_named("secondary_withdraw").len(), 1);
    assert_eq!(ledger.new_deposit(contracts().new_primary_chef, 0), ether(10));

    let store = SqliteCheckpointStore::open(temp_file.path()).expect("reopen store");
    assert!(store.list().expect("list checkpoints").is_empty());
}

#[tokio::test]
async fn unusable_checkpoint_medium_still_migrates() {
    let directory = tempfile::tempdir().expect("temp dir");
    let ledger = MockLedger::new();
    ledger.primary_pool(0, PrimaryPoolKind::Standard, ether(1), 100);

    // A directory cannot be opened as a database.
    let store = open_checkpoint_store(Some(directory.path()));
    let migrator = Migrator::new(ledger.clone(), Arc::from(store), config());
    let report = migrator
        .migrate_primary(account())
        .await
        .expect("primary pass");

    assert_eq!(report.completed(), 1);
}
