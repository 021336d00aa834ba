pub mod amount;
pub mod checkpoint;
pub mod config;
mod context;
mod deposit;
pub mod driver;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod outcome;
mod primary;
pub mod redemption;
pub mod retry;
pub mod rewards;
mod secondary;

pub use checkpoint::{
    Checkpoint, CheckpointKey, CheckpointStore, InMemoryCheckpointStore, NoopCheckpointStore,
    SqliteCheckpointStore, Subsystem, open_checkpoint_store,
};
pub use config::{ContractAddresses, MigrationConfig};
pub use driver::Migrator;
pub use error::MigrationError;
pub use ledger::{Ledger, LedgerCall, LedgerError};
pub use outcome::{
    ClaimStatus, MigrationSummary, PositionOutcome, PositionReport, SkipReason, Stage,
    SubsystemReport,
};
pub use retry::RetryPolicy;
