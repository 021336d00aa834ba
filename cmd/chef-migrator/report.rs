use std::time::Instant;

use chef_migrator::{
    ClaimStatus, MigrationError, PositionOutcome, PositionReport, Subsystem, SubsystemReport,
    checkpoint::StoredCheckpoint, ledger::Address,
};
use serde::Serialize;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub schema_version: u32,
    pub command: &'static str,
    /// `completed` when every subsystem enumerated its pools, `failed` otherwise.
    pub status: &'static str,
    pub account: String,
    pub subsystems: Vec<SubsystemSummary>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SubsystemSummary {
    pub subsystem: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub positions: Vec<PositionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimSummary>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PositionSummary {
    pub pid: u64,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposited: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether a re-run may get past the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    pub recovered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_reward: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClaimSummary {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CheckpointListReport {
    pub schema_version: u32,
    pub command: &'static str,
    pub checkpoints: Vec<CheckpointEntry>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub key: String,
    pub destination: String,
    pub amount: String,
    pub updated_at_unix: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CheckpointClearReport {
    pub schema_version: u32,
    pub command: &'static str,
    pub removed: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    schema_version: u32,
    status: &'static str,
    error: String,
    elapsed_ms: u64,
}

impl RunReport {
    pub fn new(
        command: &'static str,
        account: Address,
        results: &[(Subsystem, Result<SubsystemReport, MigrationError>)],
        started_at: Instant,
    ) -> Self {
        let subsystems: Vec<_> = results
            .iter()
            .map(|(subsystem, result)| SubsystemSummary::new(*subsystem, result))
            .collect();
        let status = if results.iter().all(|(_, result)| result.is_ok()) {
            "completed"
        } else {
            "failed"
        };

        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            command,
            status,
            account: format!("{account:#x}"),
            subsystems,
            elapsed_ms: elapsed_ms(started_at),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "completed"
    }
}

impl SubsystemSummary {
    fn new(subsystem: Subsystem, result: &Result<SubsystemReport, MigrationError>) -> Self {
        match result {
            Ok(report) => Self {
                subsystem: subsystem.as_str(),
                status: "completed",
                error: None,
                completed: report.completed(),
                skipped: report.skipped(),
                failed: report.failed(),
                positions: report.positions.iter().map(PositionSummary::from).collect(),
                claim: Some(ClaimSummary::from(&report.claim)),
            },
            Err(error) => Self {
                subsystem: subsystem.as_str(),
                status: "aborted",
                error: Some(error.to_string()),
                completed: 0,
                skipped: 0,
                failed: 0,
                positions: Vec::new(),
                claim: None,
            },
        }
    }
}

impl From<&PositionReport> for PositionSummary {
    fn from(report: &PositionReport) -> Self {
        let (outcome, skip_reason, deposited, error) = match &report.outcome {
            PositionOutcome::Completed { deposited } => {
                ("completed", None, Some(deposited.to_string()), None)
            }
            PositionOutcome::Skipped(reason) => ("skipped", Some(reason.as_str()), None, None),
            PositionOutcome::Failed(error) => ("failed", None, None, Some(error)),
        };

        Self {
            pid: report.pid,
            outcome,
            skip_reason,
            deposited,
            error: error.map(ToString::to_string),
            retryable: error.map(MigrationError::is_transient),
            recovered: report.recovered,
            queued_reward: report.queued_reward.map(|reward| reward.to_string()),
        }
    }
}

impl From<&ClaimStatus> for ClaimSummary {
    fn from(claim: &ClaimStatus) -> Self {
        let empty = Self {
            status: "nothing_to_claim",
            tx_hash: None,
            positions: None,
            total: None,
            error: None,
        };
        match claim {
            ClaimStatus::NothingToClaim => empty,
            ClaimStatus::Claimed {
                tx_hash,
                positions,
                total,
            } => Self {
                status: "claimed",
                tx_hash: Some(format!("{tx_hash:#x}")),
                positions: Some(*positions),
                total: Some(total.to_string()),
                ..empty
            },
            ClaimStatus::Failed(error) => Self {
                status: "failed",
                error: Some(error.to_string()),
                ..empty
            },
        }
    }
}

impl From<&StoredCheckpoint> for CheckpointEntry {
    fn from(stored: &StoredCheckpoint) -> Self {
        Self {
            key: stored.key.clone(),
            destination: format!("{:#x}", stored.checkpoint.destination_resource),
            amount: stored.checkpoint.amount.to_string(),
            updated_at_unix: stored.updated_at_unix,
        }
    }
}

pub fn emit_run_report(json: bool, report: &RunReport) {
    if json {
        print_json_line(report);
        return;
    }

    println!("Migration for {} ({})", report.account, report.command);
    for subsystem in &report.subsystems {
        if let Some(error) = &subsystem.error {
            println!("[{}] aborted: {error}", subsystem.subsystem);
            continue;
        }
        println!(
            "[{}] completed={} skipped={} failed={}",
            subsystem.subsystem, subsystem.completed, subsystem.skipped, subsystem.failed
        );
        for position in subsystem
            .positions
            .iter()
            .filter(|position| position.skip_reason != Some("no_funds"))
        {
            println!("  {}", position_line(position));
        }
        if let Some(claim) = &subsystem.claim {
            println!("  {}", claim_line(claim));
        }
    }
    println!("Elapsed: {} ms", report.elapsed_ms);
}

pub fn emit_checkpoint_list(json: bool, report: &CheckpointListReport) {
    if json {
        print_json_line(report);
        return;
    }

    if report.checkpoints.is_empty() {
        println!("No pending checkpoints");
        return;
    }
    for entry in &report.checkpoints {
        println!(
            "{} destination={} amount={} updated_at={}",
            entry.key, entry.destination, entry.amount, entry.updated_at_unix
        );
    }
}

pub fn emit_checkpoint_clear(json: bool, report: &CheckpointClearReport) {
    if json {
        print_json_line(report);
        return;
    }

    println!("Removed {} checkpoint(s)", report.removed.len());
    for key in &report.removed {
        println!("  {key}");
    }
}

pub fn emit_error_report(json: bool, started_at: Instant, error: &eyre::Report) {
    if json {
        print_json_line(&ErrorReport {
            schema_version: REPORT_SCHEMA_VERSION,
            status: "failed",
            error: format!("{error:#}"),
            elapsed_ms: elapsed_ms(started_at),
        });
    } else {
        eprintln!("Error: {error:?}");
    }
}

fn position_line(position: &PositionSummary) -> String {
    let mut line = format!("pid {}: {}", position.pid, position.outcome);
    if let Some(reason) = position.skip_reason {
        line.push_str(&format!(" ({reason})"));
    }
    if let Some(deposited) = &position.deposited {
        line.push_str(&format!(" deposited={deposited}"));
    }
    if let Some(error) = &position.error {
        line.push_str(&format!(" error={error}"));
    }
    if position.retryable == Some(true) {
        line.push_str(" (re-run to resume)");
    }
    if position.recovered {
        line.push_str(" [recovered]");
    }
    if let Some(reward) = &position.queued_reward {
        line.push_str(&format!(" reward={reward}"));
    }
    line
}

fn claim_line(claim: &ClaimSummary) -> String {
    match (claim.status, &claim.tx_hash, &claim.error) {
        ("claimed", Some(tx_hash), _) => format!(
            "claim: {} position(s), total={} tx={tx_hash}",
            claim.positions.unwrap_or_default(),
            claim.total.as_deref().unwrap_or("0"),
        ),
        ("failed", _, Some(error)) => format!("claim: failed: {error}"),
        (status, _, _) => format!("claim: {status}"),
    }
}

fn print_json_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(error) => eprintln!("Failed to serialize report: {error}"),
    }
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}
