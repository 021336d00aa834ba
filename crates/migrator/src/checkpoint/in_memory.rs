use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::warn;

use super::{Checkpoint, CheckpointKey, CheckpointStore};

/// Keeps encoded records in memory, keyed the same way the sqlite store is.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCheckpointStore(Arc<Mutex<HashMap<String, String>>>);

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Option<MutexGuard<'_, HashMap<String, String>>> {
        self.0
            .lock()
            .inspect_err(|_| warn!("Checkpoint store lock poisoned"))
            .ok()
    }

    /// Raw record stored under `key`, as it would be persisted.
    pub fn raw(&self, key: &CheckpointKey) -> Option<String> {
        self.inner()?.get(&key.storage_key()).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn get(&self, key: &CheckpointKey) -> Option<Checkpoint> {
        let raw = self.raw(key)?;
        Checkpoint::decode(&raw)
            .inspect_err(|error| {
                warn!(key = %key.storage_key(), %error, "Ignoring unreadable checkpoint")
            })
            .ok()
    }

    fn set(&self, key: &CheckpointKey, checkpoint: &Checkpoint) {
        let encoded = match checkpoint.encode() {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(key = %key.storage_key(), %error, "Could not encode checkpoint");
                return;
            }
        };
        if let Some(mut records) = self.inner() {
            records.insert(key.storage_key(), encoded);
        }
    }

    fn clear(&self, key: &CheckpointKey) {
        if let Some(mut records) = self.inner() {
            records.remove(&key.storage_key());
        }
    }
}
