//! Snapshot cache with a monotonic version guard.

use std::collections::HashMap;

use async_trait::async_trait;

use super::Guarded;
use crate::domain::ports::{VerificationSnapshotRepository, VerificationSnapshotRepositoryError};
use crate::domain::{MemberId, VerificationSnapshot};

/// In-memory [`VerificationSnapshotRepository`].
#[derive(Debug)]
pub struct InMemoryVerificationSnapshotRepository {
    rows: Guarded<HashMap<MemberId, VerificationSnapshot>>,
}

impl Default for InMemoryVerificationSnapshotRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVerificationSnapshotRepository {
    /// Empty cache.
    pub fn new() -> Self {
        Self {
            rows: Guarded::new("verification snapshot", HashMap::new()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.rows.set_offline(offline);
    }

    /// Overwrite a member's snapshot, bypassing the version guard.
    ///
    /// Reproduces the hand-patched cache rows that drift detection exists
    /// to catch.
    pub fn put(
        &self,
        snapshot: VerificationSnapshot,
    ) -> Result<(), VerificationSnapshotRepositoryError> {
        self.rows
            .lock::<VerificationSnapshotRepositoryError>()?
            .insert(snapshot.member_id, snapshot);
        Ok(())
    }
}

#[async_trait]
impl VerificationSnapshotRepository for InMemoryVerificationSnapshotRepository {
    async fn find(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<VerificationSnapshot>, VerificationSnapshotRepositoryError> {
        Ok(self
            .rows
            .lock::<VerificationSnapshotRepositoryError>()?
            .get(member_id)
            .cloned())
    }

    async fn upsert_if_not_older(
        &self,
        snapshot: &VerificationSnapshot,
    ) -> Result<(), VerificationSnapshotRepositoryError> {
        let mut rows = self.rows.lock::<VerificationSnapshotRepositoryError>()?;
        let stored_version = rows
            .get(&snapshot.member_id)
            .map_or(0, |stored| stored.source_version);
        if stored_version > snapshot.source_version {
            return Err(VerificationSnapshotRepositoryError::version_regressed(
                stored_version,
                snapshot.source_version,
            ));
        }
        rows.insert(snapshot.member_id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::Utc;
    use rstest::rstest;

    use super::*;

    fn snapshot(member_id: MemberId, source_version: u64) -> VerificationSnapshot {
        let mut snapshot = VerificationSnapshot::derive(member_id, None, Utc::now());
        snapshot.source_version = source_version;
        snapshot
    }

    #[rstest]
    #[case(2, 3, true)]
    #[case(3, 3, true)]
    #[case(4, 3, false)]
    #[tokio::test]
    async fn writes_never_move_the_version_backwards(
        #[case] stored: u64,
        #[case] attempted: u64,
        #[case] accepted: bool,
    ) {
        let repo = InMemoryVerificationSnapshotRepository::new();
        let member_id = MemberId::random();
        repo.put(snapshot(member_id, stored)).expect("seed snapshot");

        let outcome = repo.upsert_if_not_older(&snapshot(member_id, attempted)).await;
        assert_eq!(outcome.is_ok(), accepted);
        if !accepted {
            assert_eq!(
                outcome,
                Err(VerificationSnapshotRepositoryError::version_regressed(
                    stored, attempted
                ))
            );
        }

        let kept = repo
            .find(&member_id)
            .await
            .expect("readable")
            .expect("present");
        assert_eq!(kept.source_version, stored.max(attempted));
    }
}
