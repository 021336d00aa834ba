use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::{Checkpoint, CheckpointKey, CheckpointStore};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("checkpoint database lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub key: String,
    pub checkpoint: Checkpoint,
    pub updated_at_unix: u64,
}

#[derive(Debug)]
pub struct SqliteCheckpointStore {
    connection: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let connection = Connection::open(path)?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.connection.lock().map_err(|_| StorageError::Poisoned)
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        self.connection()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS checkpoints (
                key TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                updated_at_unix INTEGER NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    pub fn load(&self, key: &str) -> Result<Option<Checkpoint>, StorageError> {
        let raw: Option<String> = self
            .connection()?
            .query_row(
                "SELECT record FROM checkpoints WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| Checkpoint::decode(&raw))
            .transpose()
            .map_err(StorageError::from)
    }

    pub fn store(&self, key: &str, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let record = checkpoint.encode()?;
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let updated_at = i64::try_from(updated_at).unwrap_or(i64::MAX);

        self.connection()?.execute(
            "
            INSERT INTO checkpoints (key, record, updated_at_unix)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET record = excluded.record, updated_at_unix = excluded.updated_at_unix
            ",
            params![key, record, updated_at],
        )?;

        Ok(())
    }

    /// Removes the record under `key`, returning whether one existed.
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let removed = self
            .connection()?
            .execute("DELETE FROM checkpoints WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Every stored key, whether or not its record still decodes.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare("SELECT key FROM checkpoints ORDER BY key ASC")?;
        let keys = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Decodable checkpoints ordered by key. Unreadable records are skipped
    /// with a warning; `keys` still reports them.
    pub fn list(&self) -> Result<Vec<StoredCheckpoint>, StorageError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(
            "
            SELECT key, record, updated_at_unix
            FROM checkpoints
            ORDER BY key ASC
            ",
        )?;

        let rows = statement.query_map([], |row| {
            let key: String = row.get(0)?;
            let record: String = row.get(1)?;
            let updated_at: i64 = row.get(2)?;
            Ok((key, record, updated_at))
        })?;

        let mut checkpoints = Vec::new();
        for row in rows {
            let (key, record, updated_at) = row?;
            match Checkpoint::decode(&record) {
                Ok(checkpoint) => checkpoints.push(StoredCheckpoint {
                    key,
                    checkpoint,
                    updated_at_unix: u64::try_from(updated_at).unwrap_or_default(),
                }),
                Err(error) => warn!(%key, %error, "Skipping unreadable checkpoint record"),
            }
        }

        Ok(checkpoints)
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn get(&self, key: &CheckpointKey) -> Option<Checkpoint> {
        let storage_key = key.storage_key();
        self.load(&storage_key)
            .inspect_err(|error| warn!(key = %storage_key, %error, "Could not read checkpoint"))
            .ok()
            .flatten()
    }

    fn set(&self, key: &CheckpointKey, checkpoint: &Checkpoint) {
        let storage_key = key.storage_key();
        if let Err(error) = self.store(&storage_key, checkpoint) {
            warn!(key = %storage_key, %error, "Could not write checkpoint");
        }
    }

    fn clear(&self, key: &CheckpointKey) {
        let storage_key = key.storage_key();
        if let Err(error) = self.remove(&storage_key) {
            warn!(key = %storage_key, %error, "Could not remove checkpoint");
        }
    }
}
