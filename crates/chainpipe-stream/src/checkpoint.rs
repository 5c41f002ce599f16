//! Checkpoint store — persists a pipeline's offset for restart.
//!
//! The pipeline saves the offset of the last block whose events the consumer
//! has taken, and on start resumes right after it rather than from the
//! configured start block.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chainpipe_core::{error::StreamError, offset::Offset};

/// Storage for pipeline offsets, keyed by pipeline id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the saved offset of `pipeline_id`, if any.
    async fn load(&self, pipeline_id: &str) -> Result<Option<Offset>, StreamError>;

    /// Save (upsert) the offset of `pipeline_id`.
    async fn save(&self, pipeline_id: &str, offset: &Offset) -> Result<(), StreamError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral pipelines.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Offset>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one offset.
    pub fn with_offset(pipeline_id: impl Into<String>, offset: Offset) -> Self {
        Self {
            data: Mutex::new(HashMap::from([(pipeline_id.into(), offset)])),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Offset>>, StreamError> {
        self.data
            .lock()
            .map_err(|_| StreamError::Checkpoint("checkpoint store lock poisoned".into()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, pipeline_id: &str) -> Result<Option<Offset>, StreamError> {
        Ok(self.lock()?.get(pipeline_id).cloned())
    }

    async fn save(&self, pipeline_id: &str, offset: &Offset) -> Result<(), StreamError> {
        self.lock()?.insert(pipeline_id.to_string(), offset.clone());
        Ok(())
    }
}
