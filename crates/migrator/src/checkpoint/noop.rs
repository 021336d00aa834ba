use super::{Checkpoint, CheckpointKey, CheckpointStore};

/// Store used when no persistent medium is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCheckpointStore;

impl CheckpointStore for NoopCheckpointStore {
    fn get(&self, _key: &CheckpointKey) -> Option<Checkpoint> {
        None
    }

    fn set(&self, _key: &CheckpointKey, _checkpoint: &Checkpoint) {}

    fn clear(&self, _key: &CheckpointKey) {}
}
