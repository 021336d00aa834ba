//! Durable record of positions withdrawn from an old chef but not yet
//! deposited into its successor.
//!
//! A checkpoint for `(subsystem, account, pid)` exists iff the withdrawal was
//! confirmed and the deposit was not. Re-running the migration after a crash
//! reads it back instead of withdrawing again.
//!
//! Stores never fail at the interface: a broken medium is logged and behaves
//! as if nothing was stored, which degrades resumability but never aborts a
//! migration.

mod in_memory;
mod noop;
mod sqlite;

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ledger::{Address, U256};

pub use in_memory::InMemoryCheckpointStore;
pub use noop::NoopCheckpointStore;
pub use sqlite::{SqliteCheckpointStore, StorageError, StoredCheckpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// MasterChef family.
    Primary,
    /// SousChef family.
    Secondary,
}

impl Subsystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub subsystem: Subsystem,
    pub account: Address,
    pub pid: u64,
}

impl CheckpointKey {
    pub fn new(subsystem: Subsystem, account: Address, pid: u64) -> Self {
        Self {
            subsystem,
            account,
            pid,
        }
    }

    pub fn storage_key(&self) -> String {
        format!(
            "migration_{}_{:#x}_pid_{}",
            self.subsystem, self.account, self.pid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Token to deposit into the new chef.
    pub destination_resource: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
}

impl Checkpoint {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

pub trait CheckpointStore: Send + Sync {
    fn get(&self, key: &CheckpointKey) -> Option<Checkpoint>;

    fn set(&self, key: &CheckpointKey, checkpoint: &Checkpoint);

    fn clear(&self, key: &CheckpointKey);
}

/// Opens the sqlite store at `path`, falling back to a store that keeps
/// nothing when the medium is missing or unusable.
pub fn open_checkpoint_store(path: Option<&Path>) -> Box<dyn CheckpointStore> {
    let Some(path) = path else {
        warn!("No checkpoint database configured, migration will not be resumable");
        return Box::new(NoopCheckpointStore);
    };

    match SqliteCheckpointStore::open(path) {
        Ok(store) => Box::new(store),
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "Could not open checkpoint database, migration will not be resumable"
            );
            Box::new(NoopCheckpointStore)
        }
    }
}

/// Amounts are persisted as decimal strings so any JSON reader keeps full precision.
mod decimal_u256 {
    use ethereum_types::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(&raw).map_err(|err| D::Error::custom(format!("{err:?}")))
    }
}
