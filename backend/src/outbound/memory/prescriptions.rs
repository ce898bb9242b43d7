//! Prescription table ordered by id.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;

use super::Guarded;
use crate::domain::ports::{PrescriptionRepository, PrescriptionRepositoryError};
use crate::domain::{Prescription, PrescriptionId, PrescriptionStatus};

type Rows = BTreeMap<PrescriptionId, Prescription>;

/// In-memory [`PrescriptionRepository`].
#[derive(Debug)]
pub struct InMemoryPrescriptionRepository {
    rows: Guarded<Rows>,
}

impl Default for InMemoryPrescriptionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPrescriptionRepository {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            rows: Guarded::new("prescription", BTreeMap::new()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.rows.set_offline(offline);
    }

    /// Store `prescription` as-is, replacing any row with the same id.
    ///
    /// Used for seeding states that the service would never produce, such
    /// as an issued prescription whose grants were never written.
    pub fn put(&self, prescription: Prescription) -> Result<(), PrescriptionRepositoryError> {
        self.rows
            .lock::<PrescriptionRepositoryError>()?
            .insert(prescription.id(), prescription);
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for InMemoryPrescriptionRepository {
    async fn insert(&self, prescription: &Prescription) -> Result<(), PrescriptionRepositoryError> {
        let mut rows = self.rows.lock::<PrescriptionRepositoryError>()?;
        if rows.contains_key(&prescription.id()) {
            return Err(PrescriptionRepositoryError::duplicate(
                prescription.id().to_string(),
            ));
        }
        rows.insert(prescription.id(), prescription.clone());
        Ok(())
    }

    async fn update_if_status(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<(), PrescriptionRepositoryError> {
        let mut rows = self.rows.lock::<PrescriptionRepositoryError>()?;
        let Some(stored) = rows.get_mut(&prescription.id()) else {
            return Err(PrescriptionRepositoryError::query(format!(
                "prescription {} does not exist",
                prescription.id()
            )));
        };
        if stored.status() != expected {
            return Err(PrescriptionRepositoryError::status_changed(
                prescription.id().to_string(),
                expected.to_string(),
                stored.status().to_string(),
            ));
        }
        *stored = prescription.clone();
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &PrescriptionId,
    ) -> Result<Option<Prescription>, PrescriptionRepositoryError> {
        Ok(self
            .rows
            .lock::<PrescriptionRepositoryError>()?
            .get(id)
            .cloned())
    }

    async fn find_many(
        &self,
        ids: &[PrescriptionId],
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError> {
        let rows = self.rows.lock::<PrescriptionRepositoryError>()?;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn list_shareable_after(
        &self,
        after: Option<PrescriptionId>,
        limit: usize,
    ) -> Result<Vec<Prescription>, PrescriptionRepositoryError> {
        let rows = self.rows.lock::<PrescriptionRepositoryError>()?;
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(rows
            .range((lower, Bound::Unbounded))
            .map(|(_, prescription)| prescription)
            .filter(|prescription| prescription.status() != PrescriptionStatus::Draft)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::{NaiveDate, Utc};
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    use super::*;
    use crate::domain::{DoctorId, MemberId, PrescriptionPayload};

    fn draft(n: u128) -> Prescription {
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date");
        Prescription::draft(
            PrescriptionId::from_uuid(Uuid::from_u128(n)),
            DoctorId::random(),
            MemberId::random(),
            PrescriptionPayload {
                kind: Default::default(),
                diagnosis: String::new(),
                medications: "Amoxicilline 1g".to_owned(),
                dosage: "2 par jour".to_owned(),
                treatment_days: 7,
                prescribed_on: day,
                expires_on: day,
                urgent: false,
                sharing_scope: Default::default(),
            },
            Utc::now(),
        )
        .expect("valid draft")
    }

    fn issued(n: u128) -> Prescription {
        let mut prescription = draft(n);
        prescription.issue(Utc::now()).expect("issue draft");
        prescription
    }

    #[fixture]
    fn repo() -> InMemoryPrescriptionRepository {
        InMemoryPrescriptionRepository::new()
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_insert_is_rejected(repo: InMemoryPrescriptionRepository) {
        let prescription = draft(1);
        repo.insert(&prescription).await.expect("first insert");
        let err = repo.insert(&prescription).await.expect_err("duplicate");
        assert!(matches!(err, PrescriptionRepositoryError::Duplicate { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn update_requires_expected_status(repo: InMemoryPrescriptionRepository) {
        let mut prescription = draft(1);
        repo.insert(&prescription).await.expect("insert");
        prescription.issue(Utc::now()).expect("issue");

        let err = repo
            .update_if_status(&prescription, PrescriptionStatus::Issued)
            .await
            .expect_err("stored row is still a draft");
        assert_eq!(
            err,
            PrescriptionRepositoryError::status_changed(
                prescription.id().to_string(),
                "issued",
                "draft"
            )
        );

        repo.update_if_status(&prescription, PrescriptionStatus::Draft)
            .await
            .expect("compare-and-set succeeds");
        let stored = repo
            .find_by_id(&prescription.id())
            .await
            .expect("readable")
            .expect("present");
        assert_eq!(stored.status(), PrescriptionStatus::Issued);
    }

    #[rstest]
    #[tokio::test]
    async fn shareable_listing_skips_drafts_and_pages_by_id(repo: InMemoryPrescriptionRepository) {
        for prescription in [issued(1), draft(2), issued(3), issued(4)] {
            repo.put(prescription).expect("seed row");
        }

        let first = repo
            .list_shareable_after(None, 2)
            .await
            .expect("first page");
        let ids: Vec<_> = first.iter().map(Prescription::id).collect();
        assert_eq!(ids, vec![issued(1).id(), issued(3).id()]);

        let second = repo
            .list_shareable_after(ids.last().copied(), 2)
            .await
            .expect("second page");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id(), issued(4).id());
    }

    #[rstest]
    #[tokio::test]
    async fn find_many_skips_unknown_ids(repo: InMemoryPrescriptionRepository) {
        repo.put(issued(1)).expect("seed row");
        let found = repo
            .find_many(&[issued(1).id(), issued(9).id()])
            .await
            .expect("readable");
        assert_eq!(found.len(), 1);
    }
}
