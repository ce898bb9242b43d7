//! Contribution records with compare-and-set on the version.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;

use super::Guarded;
use crate::domain::ports::{
    ContributionRepository, ContributionRepositoryError, ContributionVersionSource, RecordVersion,
};
use crate::domain::{ContributionRecord, MemberId};

type Rows = BTreeMap<MemberId, ContributionRecord>;

/// In-memory [`ContributionRepository`] and [`ContributionVersionSource`].
///
/// A save only lands when the stored version is exactly one below the
/// record's version, so two writers racing on the same base version cannot
/// both succeed.
#[derive(Debug)]
pub struct InMemoryContributionRepository {
    rows: Guarded<Rows>,
}

impl Default for InMemoryContributionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContributionRepository {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            rows: Guarded::new("contribution", BTreeMap::new()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.rows.set_offline(offline);
    }

    /// Store `record` without the version check.
    pub fn put(&self, record: ContributionRecord) -> Result<(), ContributionRepositoryError> {
        self.rows
            .lock::<ContributionRepositoryError>()?
            .insert(record.member_id(), record);
        Ok(())
    }
}

#[async_trait]
impl ContributionRepository for InMemoryContributionRepository {
    async fn find_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<ContributionRecord>, ContributionRepositoryError> {
        Ok(self
            .rows
            .lock::<ContributionRepositoryError>()?
            .get(member_id)
            .cloned())
    }

    async fn save(&self, record: &ContributionRecord) -> Result<(), ContributionRepositoryError> {
        let Some(expected) = record.version().checked_sub(1) else {
            return Err(ContributionRepositoryError::query(format!(
                "record of member {} has never been mutated",
                record.member_id()
            )));
        };
        let mut rows = self.rows.lock::<ContributionRepositoryError>()?;
        let actual = rows
            .get(&record.member_id())
            .map_or(0, ContributionRecord::version);
        if actual != expected {
            return Err(ContributionRepositoryError::version_conflict(
                record.member_id().to_string(),
                expected,
                actual,
            ));
        }
        rows.insert(record.member_id(), record.clone());
        Ok(())
    }

    async fn list_versions_after(
        &self,
        after: Option<MemberId>,
        limit: usize,
    ) -> Result<Vec<RecordVersion>, ContributionRepositoryError> {
        let rows = self.rows.lock::<ContributionRepositoryError>()?;
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(rows
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(member_id, record)| RecordVersion {
                member_id: *member_id,
                version: record.version(),
            })
            .collect())
    }
}

#[async_trait]
impl ContributionVersionSource for InMemoryContributionRepository {
    async fn current_version(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<u64>, ContributionRepositoryError> {
        Ok(self
            .rows
            .lock::<ContributionRepositoryError>()?
            .get(member_id)
            .map(ContributionRecord::version))
    }
}
