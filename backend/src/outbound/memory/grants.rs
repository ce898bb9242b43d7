//! Grant table keyed by the `(prescription, pharmacist)` pair.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Guarded;
use crate::domain::ports::{
    GrantInsertOutcome, SharingGrantRepository, SharingGrantRepositoryError,
};
use crate::domain::{PharmacistId, PrescriptionId, SharingGrant};

type Rows = BTreeMap<(PrescriptionId, PharmacistId), SharingGrant>;

/// In-memory [`SharingGrantRepository`]; the map key makes the pair unique.
#[derive(Debug)]
pub struct InMemorySharingGrantRepository {
    rows: Guarded<Rows>,
}

impl Default for InMemorySharingGrantRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySharingGrantRepository {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            rows: Guarded::new("sharing grant", BTreeMap::new()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.rows.set_offline(offline);
    }

    /// Store `grant` as-is, replacing any grant for the same pair.
    pub fn put(&self, grant: SharingGrant) -> Result<(), SharingGrantRepositoryError> {
        self.rows
            .lock::<SharingGrantRepositoryError>()?
            .insert((grant.prescription_id, grant.pharmacist_id), grant);
        Ok(())
    }

    /// Number of stored grants, revoked ones included.
    pub fn count(&self) -> Result<usize, SharingGrantRepositoryError> {
        Ok(self.rows.lock::<SharingGrantRepositoryError>()?.len())
    }
}

#[async_trait]
impl SharingGrantRepository for InMemorySharingGrantRepository {
    async fn insert_if_absent(
        &self,
        grant: &SharingGrant,
    ) -> Result<GrantInsertOutcome, SharingGrantRepositoryError> {
        let mut rows = self.rows.lock::<SharingGrantRepositoryError>()?;
        let key = (grant.prescription_id, grant.pharmacist_id);
        if rows.contains_key(&key) {
            return Ok(GrantInsertOutcome::AlreadyPresent);
        }
        rows.insert(key, grant.clone());
        Ok(GrantInsertOutcome::Inserted)
    }

    async fn list_for_prescription(
        &self,
        prescription_id: &PrescriptionId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError> {
        let rows = self.rows.lock::<SharingGrantRepositoryError>()?;
        Ok(rows
            .values()
            .filter(|grant| grant.prescription_id == *prescription_id)
            .cloned()
            .collect())
    }

    async fn list_for_pharmacist(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<SharingGrant>, SharingGrantRepositoryError> {
        let rows = self.rows.lock::<SharingGrantRepositoryError>()?;
        Ok(rows
            .values()
            .filter(|grant| grant.pharmacist_id == *pharmacist_id)
            .cloned()
            .collect())
    }

    async fn revoke_for_prescription(
        &self,
        prescription_id: &PrescriptionId,
        at: DateTime<Utc>,
    ) -> Result<u64, SharingGrantRepositoryError> {
        let mut rows = self.rows.lock::<SharingGrantRepositoryError>()?;
        let mut changed = 0_u64;
        for grant in rows
            .values_mut()
            .filter(|grant| grant.prescription_id == *prescription_id && !grant.revoked)
        {
            grant.revoked = true;
            grant.revoked_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }
}
