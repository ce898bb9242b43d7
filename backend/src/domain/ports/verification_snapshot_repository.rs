//! Port for the cached verification snapshots.
//!
//! Writes are guarded by version: a snapshot whose `source_version` is older
//! than the stored one is rejected and the stored snapshot stays as it was.
//! An equal version is accepted so a resync may refresh `synced_at`.

use async_trait::async_trait;

use crate::domain::{MemberId, VerificationSnapshot};

use super::define_port_error;

define_port_error! {
    /// Errors raised by snapshot repository adapters.
    pub enum VerificationSnapshotRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "verification snapshot repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "verification snapshot repository query failed: {message}",
        /// The write carried an older version than the stored snapshot.
        VersionRegressed { stored: u64, attempted: u64 } =>
            "snapshot version {attempted} is older than stored version {stored}",
    }
}

/// Snapshot persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationSnapshotRepository: Send + Sync {
    /// Snapshot of `member_id`, if one was ever written.
    async fn find(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<VerificationSnapshot>, VerificationSnapshotRepositoryError>;

    /// Store `snapshot` unless the stored one has a newer `source_version`.
    async fn upsert_if_not_older(
        &self,
        snapshot: &VerificationSnapshot,
    ) -> Result<(), VerificationSnapshotRepositoryError>;
}

/// Fixture implementation that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureVerificationSnapshotRepository;

#[async_trait]
impl VerificationSnapshotRepository for FixtureVerificationSnapshotRepository {
    async fn find(
        &self,
        _member_id: &MemberId,
    ) -> Result<Option<VerificationSnapshot>, VerificationSnapshotRepositoryError> {
        Ok(None)
    }

    async fn upsert_if_not_older(
        &self,
        _snapshot: &VerificationSnapshot,
    ) -> Result<(), VerificationSnapshotRepositoryError> {
        Ok(())
    }
}
