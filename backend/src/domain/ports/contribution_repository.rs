//! Ports for the insurer-authoritative contribution records.
//!
//! [`ContributionRepository::save`] is a compare-and-set: a record carrying
//! version `n` is accepted only when the stored version is `n - 1` (or the
//! record is new and `n` is 1). This keeps one version lineage per member.

use async_trait::async_trait;

use crate::domain::{ContributionRecord, MemberId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by contribution repository adapters.
    pub enum ContributionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "contribution repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "contribution repository query failed: {message}",
        /// Another writer moved the record first.
        VersionConflict { member_id: String, expected: u64, actual: u64 } =>
            "contribution record of {member_id} is at version {actual}, expected {expected}",
    }
}

/// Member id and version pair, as scanned by drift detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordVersion {
    /// Member owning the record.
    pub member_id: MemberId,
    /// Current authoritative version.
    pub version: u64,
}

/// Contribution record persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContributionRepository: Send + Sync {
    /// Record of `member_id`, if any.
    async fn find_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<ContributionRecord>, ContributionRepositoryError>;

    /// Store `record` if the stored version is `record.version() - 1`.
    async fn save(&self, record: &ContributionRecord) -> Result<(), ContributionRepositoryError>;

    /// Versions of records with member id greater than `after`, ascending,
    /// at most `limit`.
    async fn list_versions_after(
        &self,
        after: Option<MemberId>,
        limit: usize,
    ) -> Result<Vec<RecordVersion>, ContributionRepositoryError>;
}

/// Cheap read of the authoritative version watermark.
///
/// Kept apart from [`ContributionRepository`] so snapshot reads can consult
/// it without loading the record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContributionVersionSource: Send + Sync {
    /// Current version of the member's record; `None` when none exists.
    async fn current_version(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<u64>, ContributionRepositoryError>;
}

/// Fixture implementation that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureContributionRepository;

#[async_trait]
impl ContributionRepository for FixtureContributionRepository {
    async fn find_by_member(
        &self,
        _member_id: &MemberId,
    ) -> Result<Option<ContributionRecord>, ContributionRepositoryError> {
        Ok(None)
    }

    async fn save(&self, _record: &ContributionRecord) -> Result<(), ContributionRepositoryError> {
        Ok(())
    }

    async fn list_versions_after(
        &self,
        _after: Option<MemberId>,
        _limit: usize,
    ) -> Result<Vec<RecordVersion>, ContributionRepositoryError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ContributionVersionSource for FixtureContributionRepository {
    async fn current_version(
        &self,
        _member_id: &MemberId,
    ) -> Result<Option<u64>, ContributionRepositoryError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn version_conflict_reports_both_versions() {
        let err = ContributionRepositoryError::version_conflict("m-1", 2_u64, 3_u64);
        assert_eq!(
            err.to_string(),
            "contribution record of m-1 is at version 3, expected 2"
        );
    }
}
