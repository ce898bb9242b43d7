//! Port for prescription persistence.
//!
//! Status changes go through [`PrescriptionRepository::update_if_status`], a
//! compare-and-set on the status the caller read, so two concurrent
//! transitions cannot both succeed.

use async_trait::async_trait;

use crate::domain::{Prescription, PrescriptionId, PrescriptionStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by prescription repository adapters.
    pub enum PrescriptionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "prescription repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "prescription repository query failed: {message}",
        /// A prescription with this id already exists.
        Duplicate { id: String } =>
            "prescription {id} already exists",
        /// The stored status no longer matches the expected one.
        StatusChanged { id: String, expected: String, actual: String } =>
            "prescription {id} is {actual}, expected {expected}",
    }
}

/// Prescription persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    /// Insert a new prescription.
    async fn insert(&self, prescription: &Prescription) -> Result<(), PrescriptionRepositoryError>;

    /// Replace a stored prescription whose status is still `expected`.
    async fn update_if_status(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<(), PrescriptionRepositoryError>;

    /// Look up a prescription by id.
    async fn find_by_id(
        &self,
        id: &PrescriptionId,
    ) -> Result<Option<Prescription>, PrescriptionRepositoryError>;

    /// Look up several prescriptions; unknown ids are skipped.
    async fn find_many(
        &self,
        ids: &[PrescriptionId],
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError>;

    /// Issued or Revoked prescriptions with id greater than `after`,
    /// ascending by id, at most `limit`.
    async fn list_shareable_after(
        &self,
        after: Option<PrescriptionId>,
        limit: usize,
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError>;
}

/// Fixture implementation that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePrescriptionRepository;

#[async_trait]
impl PrescriptionRepository for FixturePrescriptionRepository {
    async fn insert(&self, _prescription: &Prescription) -> Result<(), PrescriptionRepositoryError> {
        Ok(())
    }

    async fn update_if_status(
        &self,
        _prescription: &Prescription,
        _expected: PrescriptionStatus,
    ) -> Result<(), PrescriptionRepositoryError> {
        Ok(())
    }

    async fn find_by_id(
        &self,
        _id: &PrescriptionId,
    ) -> Result<Option<Prescription>, PrescriptionRepositoryError> {
        Ok(None)
    }

    async fn find_many(
        &self,
        _ids: &[PrescriptionId],
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_shareable_after(
        &self,
        _after: Option<PrescriptionId>,
        _limit: usize,
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn status_changed_names_both_statuses() {
        let err = PrescriptionRepositoryError::status_changed("rx-1", "draft", "issued");
        assert_eq!(err.to_string(), "prescription rx-1 is issued, expected draft");
    }

    #[rstest]
    #[tokio::test]
    async fn fixture_lists_nothing() {
        let repo = FixturePrescriptionRepository;
        let listed = repo
            .list_shareable_after(None, 10)
            .await
            .expect("fixture list succeeds");
        assert!(listed.is_empty());
    }
}
