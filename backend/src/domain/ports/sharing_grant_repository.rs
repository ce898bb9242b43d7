//! Port for sharing grant persistence.
//!
//! Adapters enforce uniqueness of the `(prescription, pharmacist)` pair:
//! inserting an existing pair reports [`GrantInsertOutcome::AlreadyPresent`]
//! and leaves the stored grant untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{PharmacistId, PrescriptionId, SharingGrant};

use super::define_port_error;

define_port_error! {
    /// Errors raised by sharing grant repository adapters.
    pub enum SharingGrantRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "sharing grant repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "sharing grant repository query failed: {message}",
    }
}

/// Result of an idempotent grant insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantInsertOutcome {
    /// The pair was new and is now stored.
    Inserted,
    /// The pair already existed.
    AlreadyPresent,
}

/// Sharing grant persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharingGrantRepository: Send + Sync {
    /// Store `grant` unless its pair already exists.
    async fn insert_if_absent(
        &self,
        grant: &SharingGrant,
    ) -> Result<GrantInsertOutcome, SharingGrantRepositoryError>;

    /// Every grant of a prescription, revoked ones included.
    async fn list_for_prescription(
        &self,
        prescription_id: &PrescriptionId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError>;

    /// Every grant held by a pharmacist, revoked ones included.
    async fn list_for_pharmacist(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError>;

    /// Flag every live grant of a prescription revoked at `at`.
    ///
    /// Returns how many grants changed.
    async fn revoke_for_prescription(
        &self,
        prescription_id: &PrescriptionId,
        at: DateTime<Utc>,
    ) -> Result<u64, SharingGrantRepositoryError>;
}

/// Fixture implementation that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSharingGrantRepository;

#[async_trait]
impl SharingGrantRepository for FixtureSharingGrantRepository {
    async fn insert_if_absent(
        &self,
        _grant: &SharingGrant,
    ) -> Result<GrantInsertOutcome, SharingGrantRepositoryError> {
        Ok(GrantInsertOutcome::Inserted)
    }

    async fn list_for_prescription(
        &self,
        _prescription_id: &PrescriptionId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_for_pharmacist(
        &self,
        _pharmacist_id: &PharmacistId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError> {
        Ok(Vec::new())
    }

    async fn revoke_for_prescription(
        &self,
        _prescription_id: &PrescriptionId,
        _at: DateTime<Utc>,
    ) -> Result<u64, SharingGrantRepositoryError> {
        Ok(0)
    }
}
