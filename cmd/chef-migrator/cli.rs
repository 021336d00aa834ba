use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration, time::Instant};

use chef_migrator::{
    ContractAddresses, MigrationConfig, MigrationError, Migrator, RetryPolicy,
    SqliteCheckpointStore, Subsystem, SubsystemReport,
    amount::DEFAULT_FALLBACK_BPS,
    config::DEFAULT_SLIPPAGE_BPS,
    ledger::Address,
    open_checkpoint_store,
    retry::DEFAULT_MAX_ATTEMPTS,
};
use chef_migrator_rpc::{
    ReceiptPolling, RpcClient, RpcLedger,
    ledger::{DEFAULT_RECEIPT_MAX_POLLS, DEFAULT_RECEIPT_POLL_INTERVAL},
};
use clap::{Args, Parser as ClapParser, Subcommand as ClapSubcommand};
use eyre::{WrapErr, eyre};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, filter::Directive};
use url::Url;

use crate::report::{
    CheckpointClearReport, CheckpointEntry, CheckpointListReport, REPORT_SCHEMA_VERSION,
    RunReport, emit_checkpoint_clear, emit_checkpoint_list, emit_run_report,
};

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "chef-migrator",
    author = "ParaLuni",
    about = "Move staked positions from the legacy MasterChef and SousChef contracts to their successors"
)]
pub struct CLI {
    #[command(subcommand)]
    pub command: Subcommand,
}

#[derive(ClapSubcommand)]
pub enum Subcommand {
    #[command(name = "all", about = "Migrate primary and then secondary positions")]
    All(MigrateOptions),
    #[command(name = "primary", about = "Migrate MasterChef positions only")]
    Primary(MigrateOptions),
    #[command(name = "secondary", about = "Migrate SousChef positions and claim their rewards")]
    Secondary(MigrateOptions),
    #[command(
        name = "checkpoints",
        subcommand,
        about = "Inspect or discard persisted recovery checkpoints"
    )]
    Checkpoints(CheckpointsCommand),
}

#[derive(ClapSubcommand)]
pub enum CheckpointsCommand {
    #[command(name = "list", about = "List checkpoints left behind by interrupted runs")]
    List(CheckpointDbOptions),
    #[command(name = "clear", about = "Remove one checkpoint, or all of them")]
    Clear {
        #[command(flatten)]
        db: CheckpointDbOptions,
        /// Storage key as printed by `checkpoints list`.
        #[arg(long = "key", required_unless_present = "all", conflicts_with = "all")]
        key: Option<String>,
        #[arg(long = "all", default_value_t = false)]
        all: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CheckpointDbOptions {
    #[arg(long = "checkpoint-db", env = "CHEF_MIGRATOR_CHECKPOINT_DB", value_name = "PATH")]
    pub checkpoint_db: PathBuf,
    /// Emit a machine-readable JSON line instead of human output.
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MigrateOptions {
    /// JSON-RPC endpoint that signs transactions for `--account`.
    #[arg(long = "rpc-url", env = "CHEF_MIGRATOR_RPC_URL", value_name = "URL")]
    pub rpc_url: Url,
    #[arg(
        long = "account",
        env = "CHEF_MIGRATOR_ACCOUNT",
        value_name = "ADDRESS",
        value_parser = parse_address
    )]
    pub account: Address,
    /// SQLite file holding recovery checkpoints. Without it checkpoints are not persisted.
    #[arg(long = "checkpoint-db", env = "CHEF_MIGRATOR_CHECKPOINT_DB", value_name = "PATH")]
    pub checkpoint_db: Option<PathBuf>,
    /// Attempts per ledger read before the position is reported as failed.
    #[arg(
        long = "retry-attempts",
        env = "CHEF_MIGRATOR_RETRY_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    pub retry_attempts: u32,
    #[arg(
        long = "retry-delay-ms",
        env = "CHEF_MIGRATOR_RETRY_DELAY_MS",
        default_value_t = 1_000,
        value_parser = clap::value_parser!(u64).range(0..=60_000)
    )]
    pub retry_delay_ms: u64,
    /// Share of the staked amount assumed withdrawn when no event reports it.
    #[arg(
        long = "fallback-bps",
        default_value_t = DEFAULT_FALLBACK_BPS,
        value_parser = clap::value_parser!(u64).range(1..=10_000)
    )]
    pub fallback_bps: u64,
    /// Lower bound applied to the claim pair reserves.
    #[arg(
        long = "slippage-bps",
        default_value_t = DEFAULT_SLIPPAGE_BPS,
        value_parser = clap::value_parser!(u64).range(0..=10_000)
    )]
    pub slippage_bps: u64,
    #[arg(
        long = "receipt-poll-interval-ms",
        default_value_t = default_poll_interval_ms(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub receipt_poll_interval_ms: u64,
    #[arg(
        long = "receipt-max-polls",
        default_value_t = DEFAULT_RECEIPT_MAX_POLLS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub receipt_max_polls: u32,
    #[command(flatten)]
    pub contracts: ContractOverrides,
    /// Emit a machine-readable JSON line instead of human output.
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContractOverrides {
    #[arg(long = "old-primary-chef", env = "CHEF_MIGRATOR_OLD_PRIMARY_CHEF", value_parser = parse_address)]
    pub old_primary_chef: Option<Address>,
    #[arg(long = "new-primary-chef", env = "CHEF_MIGRATOR_NEW_PRIMARY_CHEF", value_parser = parse_address)]
    pub new_primary_chef: Option<Address>,
    #[arg(long = "old-secondary-chef", env = "CHEF_MIGRATOR_OLD_SECONDARY_CHEF", value_parser = parse_address)]
    pub old_secondary_chef: Option<Address>,
    #[arg(long = "new-secondary-chef", env = "CHEF_MIGRATOR_NEW_SECONDARY_CHEF", value_parser = parse_address)]
    pub new_secondary_chef: Option<Address>,
}

impl ContractOverrides {
    fn apply(&self, defaults: ContractAddresses) -> ContractAddresses {
        ContractAddresses {
            old_primary_chef: self.old_primary_chef.unwrap_or(defaults.old_primary_chef),
            new_primary_chef: self.new_primary_chef.unwrap_or(defaults.new_primary_chef),
            old_secondary_chef: self.old_secondary_chef.unwrap_or(defaults.old_secondary_chef),
            new_secondary_chef: self.new_secondary_chef.unwrap_or(defaults.new_secondary_chef),
        }
    }
}

impl MigrateOptions {
    pub fn migration_config(&self) -> MigrationConfig {
        let defaults = MigrationConfig::default();
        MigrationConfig {
            contracts: self.contracts.apply(defaults.contracts),
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ),
            fallback_bps: self.fallback_bps,
            slippage_bps: self.slippage_bps,
            ..defaults
        }
    }

    pub fn receipt_polling(&self) -> ReceiptPolling {
        ReceiptPolling {
            interval: Duration::from_millis(self.receipt_poll_interval_ms),
            max_polls: self.receipt_max_polls,
        }
    }

    fn migrator(&self) -> Migrator {
        let client = RpcClient::new(self.rpc_url.clone());
        let ledger = RpcLedger::new(client, self.account, self.receipt_polling());
        let store = open_checkpoint_store(self.checkpoint_db.as_deref());
        Migrator::new(Arc::new(ledger), Arc::from(store), self.migration_config())
    }
}

impl Subcommand {
    pub fn json_output(&self) -> bool {
        match self {
            Self::All(options) | Self::Primary(options) | Self::Secondary(options) => options.json,
            Self::Checkpoints(CheckpointsCommand::List(db))
            | Self::Checkpoints(CheckpointsCommand::Clear { db, .. }) => db.json,
        }
    }

    /// Runs the command. `Ok(false)` means a subsystem could not enumerate its pools.
    pub async fn run(self, started_at: Instant) -> eyre::Result<bool> {
        match self {
            Self::All(options) => {
                migrate(&options, "all", &[Subsystem::Primary, Subsystem::Secondary], started_at)
                    .await
            }
            Self::Primary(options) => {
                migrate(&options, "primary", &[Subsystem::Primary], started_at).await
            }
            Self::Secondary(options) => {
                migrate(&options, "secondary", &[Subsystem::Secondary], started_at).await
            }
            Self::Checkpoints(CheckpointsCommand::List(db)) => list_checkpoints(&db),
            Self::Checkpoints(CheckpointsCommand::Clear { db, key, all }) => {
                clear_checkpoints(&db, key.as_deref(), all)
            }
        }
    }
}

async fn migrate(
    options: &MigrateOptions,
    command: &'static str,
    subsystems: &[Subsystem],
    started_at: Instant,
) -> eyre::Result<bool> {
    let migrator = options.migrator();
    info!(
        account = %format!("{:#x}", options.account),
        rpc_url = %options.rpc_url,
        "Starting migration"
    );

    let mut results: Vec<(Subsystem, Result<SubsystemReport, MigrationError>)> = Vec::new();
    for subsystem in subsystems {
        let result = match subsystem {
            Subsystem::Primary => migrator.migrate_primary(options.account).await,
            Subsystem::Secondary => migrator.migrate_secondary(options.account).await,
        };
        results.push((*subsystem, result));
    }

    let report = RunReport::new(command, options.account, &results, started_at);
    emit_run_report(options.json, &report);
    Ok(report.is_success())
}

fn open_store(db: &CheckpointDbOptions) -> eyre::Result<SqliteCheckpointStore> {
    if !db.checkpoint_db.is_file() {
        return Err(eyre!(
            "checkpoint database {} does not exist",
            db.checkpoint_db.display()
        ));
    }
    SqliteCheckpointStore::open(&db.checkpoint_db).wrap_err_with(|| {
        format!(
            "failed to open checkpoint database {}",
            db.checkpoint_db.display()
        )
    })
}

fn list_checkpoints(db: &CheckpointDbOptions) -> eyre::Result<bool> {
    let store = open_store(db)?;
    let checkpoints = store.list().wrap_err("failed to list checkpoints")?;

    emit_checkpoint_list(
        db.json,
        &CheckpointListReport {
            schema_version: REPORT_SCHEMA_VERSION,
            command: "checkpoints list",
            checkpoints: checkpoints.iter().map(CheckpointEntry::from).collect(),
        },
    );
    Ok(true)
}

fn clear_checkpoints(db: &CheckpointDbOptions, key: Option<&str>, all: bool) -> eyre::Result<bool> {
    let store = open_store(db)?;
    let keys = match key {
        Some(key) => vec![key.to_string()],
        None if all => store.keys().wrap_err("failed to list checkpoint keys")?,
        None => Vec::new(),
    };

    let mut removed = Vec::new();
    for key in keys {
        if store
            .remove(&key)
            .wrap_err_with(|| format!("failed to remove checkpoint {key}"))?
        {
            info!(%key, "Removed checkpoint");
            removed.push(key);
        }
    }

    emit_checkpoint_clear(
        db.json,
        &CheckpointClearReport {
            schema_version: REPORT_SCHEMA_VERSION,
            command: "checkpoints clear",
            removed,
        },
    );
    Ok(true)
}

pub fn parse_address(raw: &str) -> Result<Address, String> {
    Address::from_str(raw.trim_start_matches("0x"))
        .map_err(|error| format!("invalid address {raw}: {error}"))
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL.as_millis() as u64
}

/// Logs go to stderr so `--json` output stays parseable.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(Level::INFO))
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
