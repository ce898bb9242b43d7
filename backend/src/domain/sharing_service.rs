//! Prescription lifecycle and pharmacist visibility grants.
//!
//! Prescriptions are created as drafts and issued by an explicit call;
//! nothing is shared automatically. Sharing fans out one grant per pharmacist
//! the prescription's scope selects among those active at that moment.
//! Pharmacists activated later only see the prescription once
//! [`SharingService::reconcile_sharing`] has run.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::ports::{
    CheckpointRepository, GrantInsertOutcome, PharmacistRoster, PharmacistRosterError,
    PrescriptionRepository, PrescriptionRepositoryError, SharingGrantRepository,
    SharingGrantRepositoryError,
};
use crate::domain::reconciliation::map_checkpoint_error;
use crate::domain::{
    CancellationFlag, DoctorId, DomainError, MemberId, PharmacistId, PharmacistProfile, Prescription,
    PrescriptionEditError, PrescriptionId, PrescriptionPayload, PrescriptionStatus,
    ReconciliationJob, ReconciliationSummary, SharingGrant,
};

/// Default number of prescriptions examined per reconciliation batch.
pub const DEFAULT_SHARING_BATCH_SIZE: usize = 100;

fn map_prescription_error(error: PrescriptionRepositoryError) -> DomainError {
    match error {
        PrescriptionRepositoryError::Connection { .. } => DomainError::store_unavailable("prescription"),
        PrescriptionRepositoryError::Query { message } => {
            DomainError::internal(format!("prescription repository error: {message}"))
        }
        err @ (PrescriptionRepositoryError::Duplicate { .. }
        | PrescriptionRepositoryError::StatusChanged { .. }) => DomainError::conflict(err.to_string()),
    }
}

fn map_grant_error(error: SharingGrantRepositoryError) -> DomainError {
    match error {
        SharingGrantRepositoryError::Connection { .. } => DomainError::store_unavailable("sharing grant"),
        SharingGrantRepositoryError::Query { message } => {
            DomainError::internal(format!("sharing grant repository error: {message}"))
        }
    }
}

fn map_roster_error(error: PharmacistRosterError) -> DomainError {
    match error {
        PharmacistRosterError::Connection { .. } => DomainError::store_unavailable("pharmacist"),
        PharmacistRosterError::Query { message } => {
            DomainError::internal(format!("pharmacist roster error: {message}"))
        }
    }
}

fn map_edit_error(error: PrescriptionEditError) -> DomainError {
    match error {
        PrescriptionEditError::Transition(err) => DomainError::conflict(err.to_string()),
        PrescriptionEditError::Invalid(err) => {
            DomainError::invalid_request(format!("invalid prescription payload: {err}"))
        }
    }
}

/// Result of sharing a prescription with the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOutcome {
    /// Grants created by this call.
    pub granted: u64,
    /// Grants that already existed and were left untouched.
    pub already_present: u64,
}

/// Result of revoking a prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeOutcome {
    /// Whether this call moved the prescription to Revoked.
    pub newly_revoked: bool,
    /// Grants flagged revoked by this call.
    pub grants_revoked: u64,
}

/// Prescription as seen through one pharmacist's grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisiblePrescription {
    /// The shared prescription.
    pub prescription: Prescription,
    /// When the pharmacist was granted visibility.
    pub granted_at: DateTime<Utc>,
    /// When the grant was flagged revoked, if it was.
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Ports required by [`SharingService`].
pub struct SharingServicePorts {
    /// Prescription store.
    pub prescriptions: Arc<dyn PrescriptionRepository>,
    /// Grant store.
    pub grants: Arc<dyn SharingGrantRepository>,
    /// Pharmacist profiles.
    pub roster: Arc<dyn PharmacistRoster>,
    /// Reconciliation progress.
    pub checkpoints: Arc<dyn CheckpointRepository>,
}

/// Sharing propagator.
pub struct SharingService {
    prescriptions: Arc<dyn PrescriptionRepository>,
    grants: Arc<dyn SharingGrantRepository>,
    roster: Arc<dyn PharmacistRoster>,
    checkpoints: Arc<dyn CheckpointRepository>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl SharingService {
    /// Build the service over its ports.
    pub fn new(ports: SharingServicePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            prescriptions: ports.prescriptions,
            grants: ports.grants,
            roster: ports.roster,
            checkpoints: ports.checkpoints,
            clock,
            batch_size: DEFAULT_SHARING_BATCH_SIZE,
        }
    }

    /// Override the reconciliation batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Create a draft prescription authored by `doctor_id` for `member_id`.
    pub async fn create_prescription(
        &self,
        doctor_id: DoctorId,
        member_id: MemberId,
        payload: PrescriptionPayload,
    ) -> Result<Prescription, DomainError> {
        let prescription = Prescription::draft(
            PrescriptionId::random(),
            doctor_id,
            member_id,
            payload,
            self.clock.utc(),
        )
        .map_err(|err| DomainError::invalid_request(format!("invalid prescription payload: {err}")))?;

        self.prescriptions
            .insert(&prescription)
            .await
            .map_err(map_prescription_error)?;
        debug!(prescription = %prescription.id(), number = prescription.number(), "prescription drafted");
        Ok(prescription)
    }

    /// Draft → Issued, by the owning doctor only.
    pub async fn issue_prescription(
        &self,
        doctor_id: DoctorId,
        prescription_id: PrescriptionId,
    ) -> Result<Prescription, DomainError> {
        let mut prescription = self.owned_by(doctor_id, prescription_id).await?;
        let previous = prescription.status();
        prescription
            .issue(self.clock.utc())
            .map_err(|err| DomainError::conflict(err.to_string()))?;
        self.prescriptions
            .update_if_status(&prescription, previous)
            .await
            .map_err(map_prescription_error)?;
        info!(prescription = %prescription_id, "prescription issued");
        Ok(prescription)
    }

    /// Replace the content of a draft, by the owning doctor only.
    pub async fn update_prescription_content(
        &self,
        doctor_id: DoctorId,
        prescription_id: PrescriptionId,
        payload: PrescriptionPayload,
    ) -> Result<Prescription, DomainError> {
        let mut prescription = self.owned_by(doctor_id, prescription_id).await?;
        prescription
            .replace_payload(payload)
            .map_err(map_edit_error)?;
        self.prescriptions
            .update_if_status(&prescription, PrescriptionStatus::Draft)
            .await
            .map_err(map_prescription_error)?;
        Ok(prescription)
    }

    /// Grant every pharmacist the prescription's scope selects among those
    /// active now.
    ///
    /// Repeating the call never duplicates a grant; existing pairs are
    /// counted in [`ShareOutcome::already_present`].
    pub async fn share_prescription_with_network(
        &self,
        prescription_id: PrescriptionId,
    ) -> Result<ShareOutcome, DomainError> {
        let prescription = self.find(prescription_id).await?;
        if prescription.status() != PrescriptionStatus::Issued {
            return Err(DomainError::conflict(format!(
                "cannot share a {} prescription",
                prescription.status()
            )));
        }

        let active = self.roster.list_active().await.map_err(map_roster_error)?;
        let recipients = prescription.sharing_scope().recipients(&active);
        let now = self.clock.utc();

        let mut outcome = ShareOutcome::default();
        for pharmacist_id in recipients {
            match self
                .grants
                .insert_if_absent(&SharingGrant::new(prescription_id, pharmacist_id, now))
                .await
                .map_err(map_grant_error)?
            {
                GrantInsertOutcome::Inserted => outcome.granted += 1,
                GrantInsertOutcome::AlreadyPresent => outcome.already_present += 1,
            }
        }
        info!(
            prescription = %prescription_id,
            granted = outcome.granted,
            already_present = outcome.already_present,
            "prescription shared"
        );
        Ok(outcome)
    }

    /// Prescriptions `pharmacist_id` holds a live grant for.
    ///
    /// Ordered by issue date, newest first; ties by prescription id.
    pub async fn list_visible_prescriptions(
        &self,
        pharmacist_id: PharmacistId,
    ) -> Result<Vec<VisiblePrescription>, DomainError> {
        let grants: Vec<SharingGrant> = self
            .grants
            .list_for_pharmacist(&pharmacist_id)
            .await
            .map_err(map_grant_error)?
            .into_iter()
            .filter(|grant| !grant.revoked)
            .collect();

        let mut visible: Vec<VisiblePrescription> = self
            .join_grants(grants)
            .await?
            .into_iter()
            .filter(|entry| entry.prescription.status() != PrescriptionStatus::Revoked)
            .collect();
        visible.sort_by_key(|entry| {
            (
                Reverse(entry.prescription.issued_at()),
                entry.prescription.id(),
            )
        });
        Ok(visible)
    }

    /// Revoked prescriptions `pharmacist_id` was granted, newest revocation
    /// first; ties by prescription id.
    pub async fn list_revoked_prescriptions(
        &self,
        pharmacist_id: PharmacistId,
    ) -> Result<Vec<VisiblePrescription>, DomainError> {
        let grants = self
            .grants
            .list_for_pharmacist(&pharmacist_id)
            .await
            .map_err(map_grant_error)?;

        let mut revoked: Vec<VisiblePrescription> = self
            .join_grants(grants)
            .await?
            .into_iter()
            .filter(|entry| {
                entry.revoked_at.is_some()
                    || entry.prescription.status() == PrescriptionStatus::Revoked
            })
            .collect();
        revoked.sort_by_key(|entry| {
            (
                Reverse(entry.prescription.revoked_at().or(entry.revoked_at)),
                entry.prescription.id(),
            )
        });
        Ok(revoked)
    }

    /// Mark the prescription Revoked, then flag its grants revoked.
    ///
    /// Re-running on an already revoked prescription repairs grants a
    /// previous call failed to flag.
    pub async fn revoke_prescription(
        &self,
        prescription_id: PrescriptionId,
    ) -> Result<RevokeOutcome, DomainError> {
        let mut prescription = self.find(prescription_id).await?;
        let previous = prescription.status();
        let newly_revoked = prescription.revoke(self.clock.utc());
        if newly_revoked {
            self.prescriptions
                .update_if_status(&prescription, previous)
                .await
                .map_err(map_prescription_error)?;
        }

        let revoked_at = prescription.revoked_at().unwrap_or_else(|| self.clock.utc());
        let grants_revoked = self
            .grants
            .revoke_for_prescription(&prescription_id, revoked_at)
            .await
            .map_err(map_grant_error)?;

        info!(
            prescription = %prescription_id,
            newly_revoked,
            grants_revoked,
            "prescription revoked"
        );
        Ok(RevokeOutcome {
            newly_revoked,
            grants_revoked,
        })
    }

    /// Backfill missing grants of Issued prescriptions and mirror the
    /// revocation of Revoked ones.
    ///
    /// Works in id-ordered batches, resuming after the saved checkpoint.
    /// Cancellation is honoured between batches and leaves the checkpoint
    /// in place; a completed pass clears it.
    pub async fn reconcile_sharing(
        &self,
        cancel: &CancellationFlag,
    ) -> Result<ReconciliationSummary, DomainError> {
        let job = ReconciliationJob::Sharing;
        let mut cursor = self.load_cursor().await?;
        let mut summary = ReconciliationSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let batch = self
                .prescriptions
                .list_shareable_after(cursor, self.batch_size)
                .await
                .map_err(map_prescription_error)?;
            let Some(last) = batch.last().map(Prescription::id) else {
                break;
            };
            let active = self.roster.list_active().await.map_err(map_roster_error)?;

            for prescription in &batch {
                summary.scanned += 1;
                match self.repair(prescription, &active).await {
                    Ok(true) => summary.fixed += 1,
                    Ok(false) => {}
                    Err(error) => {
                        summary.errors += 1;
                        warn!(
                            prescription = %prescription.id(),
                            error = %error,
                            "sharing repair failed; continuing"
                        );
                    }
                }
            }

            cursor = Some(last);
            self.checkpoints
                .save(job, &last.to_string())
                .await
                .map_err(map_checkpoint_error)?;
            if batch.len() < self.batch_size {
                break;
            }
        }

        if !summary.cancelled {
            self.checkpoints
                .clear(job)
                .await
                .map_err(map_checkpoint_error)?;
        }
        info!(
            job = %job,
            scanned = summary.scanned,
            fixed = summary.fixed,
            errors = summary.errors,
            cancelled = summary.cancelled,
            "sharing reconciliation finished"
        );
        Ok(summary)
    }

    async fn repair(
        &self,
        prescription: &Prescription,
        active: &[PharmacistProfile],
    ) -> Result<bool, DomainError> {
        let prescription_id = prescription.id();
        let existing = self
            .grants
            .list_for_prescription(&prescription_id)
            .await
            .map_err(map_grant_error)?;

        match prescription.status() {
            PrescriptionStatus::Issued => {
                let granted: HashSet<PharmacistId> =
                    existing.iter().map(|grant| grant.pharmacist_id).collect();
                let now = self.clock.utc();
                let mut inserted = 0_u64;
                for pharmacist_id in prescription.sharing_scope().recipients(active) {
                    if granted.contains(&pharmacist_id) {
                        continue;
                    }
                    let outcome = self
                        .grants
                        .insert_if_absent(&SharingGrant::new(prescription_id, pharmacist_id, now))
                        .await
                        .map_err(map_grant_error)?;
                    if outcome == GrantInsertOutcome::Inserted {
                        inserted += 1;
                    }
                }
                if inserted > 0 {
                    debug!(prescription = %prescription_id, inserted, "grants backfilled");
                }
                Ok(inserted > 0)
            }
            PrescriptionStatus::Revoked => {
                if existing.iter().all(|grant| grant.revoked) {
                    return Ok(false);
                }
                let at = prescription.revoked_at().unwrap_or_else(|| self.clock.utc());
                let flagged = self
                    .grants
                    .revoke_for_prescription(&prescription_id, at)
                    .await
                    .map_err(map_grant_error)?;
                if flagged > 0 {
                    debug!(prescription = %prescription_id, flagged, "grant revocations mirrored");
                }
                Ok(flagged > 0)
            }
            PrescriptionStatus::Draft => Ok(false),
        }
    }

    async fn load_cursor(&self) -> Result<Option<PrescriptionId>, DomainError> {
        let saved = self
            .checkpoints
            .load(ReconciliationJob::Sharing)
            .await
            .map_err(map_checkpoint_error)?;
        Ok(saved.and_then(|raw| match PrescriptionId::new(&raw) {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(cursor = %raw, error = %error, "discarding unreadable sharing checkpoint");
                None
            }
        }))
    }

    async fn find(&self, prescription_id: PrescriptionId) -> Result<Prescription, DomainError> {
        self.prescriptions
            .find_by_id(&prescription_id)
            .await
            .map_err(map_prescription_error)?
            .ok_or_else(|| DomainError::not_found("prescription", prescription_id))
    }

    async fn owned_by(
        &self,
        doctor_id: DoctorId,
        prescription_id: PrescriptionId,
    ) -> Result<Prescription, DomainError> {
        let prescription = self.find(prescription_id).await?;
        if prescription.doctor_id() != doctor_id {
            return Err(DomainError::conflict(format!(
                "prescription {prescription_id} belongs to another doctor"
            )));
        }
        Ok(prescription)
    }

    async fn join_grants(
        &self,
        grants: Vec<SharingGrant>,
    ) -> Result<Vec<VisiblePrescription>, DomainError> {
        if grants.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<PrescriptionId> = grants.iter().map(|grant| grant.prescription_id).collect();
        let prescriptions = self
            .prescriptions
            .find_many(&ids)
            .await
            .map_err(map_prescription_error)?;

        Ok(grants
            .into_iter()
            .filter_map(|grant| {
                prescriptions
                    .iter()
                    .find(|prescription| prescription.id() == grant.prescription_id)
                    .map(|prescription| VisiblePrescription {
                        prescription: prescription.clone(),
                        granted_at: grant.granted_at,
                        revoked_at: grant.revoked_at,
                    })
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "sharing_service_tests.rs"]
mod tests;
