use std::fmt;

use crate::{
    checkpoint::Subsystem,
    error::MigrationError,
    ledger::{H256, U256},
};

/// Progress of a single position through a migration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Recovered,
    Withdrawing,
    Withdrawn,
    Depositing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing staked and no tickets held.
    NoFunds,
    /// The new chef gives the pool no allocation; the checkpoint is kept for a later run.
    InactiveDestination,
    /// At most one unit would have been deposited.
    Dust,
    /// Time-locked pool whose unlock time is still in the future.
    NotMatured,
    /// Regular pool with a redemption period but no slot open for redemption.
    NoRedeemableSlots,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFunds => "no_funds",
            Self::InactiveDestination => "inactive_destination",
            Self::Dust => "dust",
            Self::NotMatured => "not_matured",
            Self::NoRedeemableSlots => "no_redeemable_slots",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum PositionOutcome {
    Completed { deposited: U256 },
    Skipped(SkipReason),
    Failed(MigrationError),
}

impl PositionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct PositionReport {
    pub pid: u64,
    pub outcome: PositionOutcome,
    /// Resumed from a checkpoint instead of withdrawing.
    pub recovered: bool,
    pub queued_reward: Option<U256>,
}

#[derive(Debug)]
pub enum ClaimStatus {
    NothingToClaim,
    Claimed {
        tx_hash: H256,
        positions: usize,
        total: U256,
    },
    Failed(MigrationError),
}

#[derive(Debug)]
pub struct SubsystemReport {
    pub subsystem: Subsystem,
    pub positions: Vec<PositionReport>,
    pub claim: ClaimStatus,
}

impl SubsystemReport {
    pub fn completed(&self) -> usize {
        self.count(|outcome| matches!(outcome, PositionOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, PositionOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(PositionOutcome::is_failed)
    }

    fn count(&self, predicate: impl Fn(&PositionOutcome) -> bool) -> usize {
        self.positions
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}

#[derive(Debug)]
pub struct MigrationSummary {
    pub primary: Result<SubsystemReport, MigrationError>,
    pub secondary: Result<SubsystemReport, MigrationError>,
}

impl MigrationSummary {
    /// Whether either subsystem aborted before processing its pools.
    pub fn setup_failed(&self) -> bool {
        self.primary.is_err() || self.secondary.is_err()
    }
}
