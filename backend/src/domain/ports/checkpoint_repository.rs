//! Port persisting per-job progress of the batch repair jobs.
//!
//! A cursor is the last key a job fully processed, stored as its string
//! form. A cancelled run leaves its cursor behind; a completed run clears it.

use async_trait::async_trait;

use crate::domain::ReconciliationJob;

use super::define_port_error;

define_port_error! {
    /// Errors raised by checkpoint repository adapters.
    pub enum CheckpointRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "checkpoint repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "checkpoint repository query failed: {message}",
    }
}

/// Job cursor persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Cursor saved for `job`.
    async fn load(&self, job: ReconciliationJob)
    -> Result<Option<String>, CheckpointRepositoryError>;

    /// Persist `cursor` for `job`.
    async fn save(
        &self,
        job: ReconciliationJob,
        cursor: &str,
    ) -> Result<(), CheckpointRepositoryError>;

    /// Forget the cursor of `job`.
    async fn clear(&self, job: ReconciliationJob) -> Result<(), CheckpointRepositoryError>;
}

/// Fixture implementation that never remembers progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCheckpointRepository;

#[async_trait]
impl CheckpointRepository for FixtureCheckpointRepository {
    async fn load(
        &self,
        _job: ReconciliationJob,
    ) -> Result<Option<String>, CheckpointRepositoryError> {
        Ok(None)
    }

    async fn save(
        &self,
        _job: ReconciliationJob,
        _cursor: &str,
    ) -> Result<(), CheckpointRepositoryError> {
        Ok(())
    }

    async fn clear(&self, _job: ReconciliationJob) -> Result<(), CheckpointRepositoryError> {
        Ok(())
    }
}
