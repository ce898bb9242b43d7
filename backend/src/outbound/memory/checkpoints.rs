//! Per-job reconciliation cursors.

use std::collections::HashMap;

use async_trait::async_trait;

use super::Guarded;
use crate::domain::ReconciliationJob;
use crate::domain::ports::{CheckpointRepository, CheckpointRepositoryError};

/// In-memory [`CheckpointRepository`].
#[derive(Debug)]
pub struct InMemoryCheckpointRepository {
    cursors: Guarded<HashMap<ReconciliationJob, String>>,
}

impl Default for InMemoryCheckpointRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCheckpointRepository {
    /// No saved cursors.
    pub fn new() -> Self {
        Self {
            cursors: Guarded::new("checkpoint", HashMap::new()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.cursors.set_offline(offline);
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn load(
        &self,
        job: ReconciliationJob,
    ) -> Result<Option<String>, CheckpointRepositoryError> {
        Ok(self
            .cursors
            .lock::<CheckpointRepositoryError>()?
            .get(&job)
            .cloned())
    }

    async fn save(
        &self,
        job: ReconciliationJob,
        cursor: &str,
    ) -> Result<(), CheckpointRepositoryError> {
        self.cursors
            .lock::<CheckpointRepositoryError>()?
            .insert(job, cursor.to_owned());
        Ok(())
    }

    async fn clear(&self, job: ReconciliationJob) -> Result<(), CheckpointRepositoryError> {
        self.cursors
            .lock::<CheckpointRepositoryError>()?
            .remove(&job);
        Ok(())
    }
}
