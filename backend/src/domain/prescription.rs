//! Prescription aggregate and the pharmacist visibility grant.
//!
//! A prescription is authored by a doctor for a member and moves
//! Draft → Issued → Revoked. It is never deleted. Grants are the only way a
//! pharmacist sees a prescription; they mirror its revocation rather than
//! disappearing.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::short_hex;
use super::{DoctorId, MemberId, PharmacistId, PharmacistProfile, PrescriptionId};

/// Default treatment length, in days.
pub const DEFAULT_TREATMENT_DAYS: u16 = 7;

/// Lifecycle state of a prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    /// Being written; editable by its doctor, invisible to pharmacists.
    Draft,
    /// Finalised; eligible for sharing.
    Issued,
    /// Withdrawn; grants are kept and flagged revoked.
    Revoked,
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Revoked => "revoked",
        })
    }
}

/// What the prescription orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionKind {
    /// Medicines to dispense.
    #[default]
    Medication,
    /// Laboratory analyses.
    LabTests,
    /// Medical imaging.
    Imaging,
    /// Nursing care.
    Nursing,
    /// Anything else.
    Other,
}

/// Which pharmacists a prescription is shared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SharingScope {
    /// Every active pharmacist in the network.
    #[default]
    Network,
    /// One named pharmacist, provided they are active.
    Targeted {
        /// Sole recipient.
        pharmacist_id: PharmacistId,
    },
}

impl SharingScope {
    /// Pharmacists this scope requires a grant for, given the active set.
    ///
    /// The result is sorted by pharmacist id.
    pub fn recipients(&self, active: &[PharmacistProfile]) -> Vec<PharmacistId> {
        let mut recipients: Vec<PharmacistId> = active
            .iter()
            .filter(|profile| profile.active)
            .map(|profile| profile.id)
            .filter(|id| match self {
                Self::Network => true,
                Self::Targeted { pharmacist_id } => id == pharmacist_id,
            })
            .collect();
        recipients.sort_unstable();
        recipients.dedup();
        recipients
    }
}

/// Doctor-authored content of a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionPayload {
    /// Order category.
    #[serde(default)]
    pub kind: PrescriptionKind,
    /// Diagnosis justifying the order. May be empty.
    #[serde(default)]
    pub diagnosis: String,
    /// Prescribed medicines or acts.
    pub medications: String,
    /// Dosage instructions.
    pub dosage: String,
    /// Treatment length in days.
    #[serde(default = "default_treatment_days")]
    pub treatment_days: u16,
    /// Date the doctor wrote the order.
    pub prescribed_on: NaiveDate,
    /// Last day the order may be dispensed.
    pub expires_on: NaiveDate,
    /// Urgent orders are flagged to pharmacists.
    #[serde(default)]
    pub urgent: bool,
    /// Sharing policy applied when the prescription is shared.
    #[serde(default)]
    pub sharing_scope: SharingScope,
}

const fn default_treatment_days() -> u16 {
    DEFAULT_TREATMENT_DAYS
}

/// Validation failures for [`PrescriptionPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrescriptionValidationError {
    /// No medication or act was listed.
    EmptyMedications,
    /// No dosage was given.
    EmptyDosage,
    /// Treatment length was zero days.
    ZeroTreatmentDays,
    /// The expiry date precedes the prescription date.
    ExpiresBeforePrescribed {
        /// Prescription date.
        prescribed_on: NaiveDate,
        /// Rejected expiry date.
        expires_on: NaiveDate,
    },
}

impl fmt::Display for PrescriptionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMedications => write!(f, "medications must not be empty"),
            Self::EmptyDosage => write!(f, "dosage must not be empty"),
            Self::ZeroTreatmentDays => write!(f, "treatment must last at least one day"),
            Self::ExpiresBeforePrescribed {
                prescribed_on,
                expires_on,
            } => write!(
                f,
                "expiry date {expires_on} precedes prescription date {prescribed_on}"
            ),
        }
    }
}

impl std::error::Error for PrescriptionValidationError {}

impl PrescriptionPayload {
    /// Check the payload invariants.
    pub fn validate(&self) -> Result<(), PrescriptionValidationError> {
        if self.medications.trim().is_empty() {
            return Err(PrescriptionValidationError::EmptyMedications);
        }
        if self.dosage.trim().is_empty() {
            return Err(PrescriptionValidationError::EmptyDosage);
        }
        if self.treatment_days == 0 {
            return Err(PrescriptionValidationError::ZeroTreatmentDays);
        }
        if self.expires_on < self.prescribed_on {
            return Err(PrescriptionValidationError::ExpiresBeforePrescribed {
                prescribed_on: self.prescribed_on,
                expires_on: self.expires_on,
            });
        }
        Ok(())
    }
}

/// Rejected lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrescriptionTransitionError {
    /// Transition attempted.
    pub action: &'static str,
    /// Status the prescription was in.
    pub status: PrescriptionStatus,
}

impl fmt::Display for PrescriptionTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} a {} prescription", self.action, self.status)
    }
}

impl std::error::Error for PrescriptionTransitionError {}

/// Prescription aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    id: PrescriptionId,
    number: String,
    doctor_id: DoctorId,
    member_id: MemberId,
    payload: PrescriptionPayload,
    status: PrescriptionStatus,
    created_at: DateTime<Utc>,
    #[serde(default)]
    issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    revoked_at: Option<DateTime<Utc>>,
}

impl Prescription {
    /// Start a new draft.
    ///
    /// # Examples
    /// ```
    /// use chrono::{NaiveDate, Utc};
    /// use mutuelle_sync::domain::{
    ///     DoctorId, MemberId, Prescription, PrescriptionId, PrescriptionPayload,
    ///     PrescriptionStatus,
    /// };
    ///
    /// let day = NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date");
    /// let payload = PrescriptionPayload {
    ///     kind: Default::default(),
    ///     diagnosis: String::new(),
    ///     medications: "Paracetamol 500mg".into(),
    ///     dosage: "1 tablet 3 times a day".into(),
    ///     treatment_days: 7,
    ///     prescribed_on: day,
    ///     expires_on: day,
    ///     urgent: false,
    ///     sharing_scope: Default::default(),
    /// };
    /// let draft = Prescription::draft(
    ///     PrescriptionId::random(),
    ///     DoctorId::random(),
    ///     MemberId::random(),
    ///     payload,
    ///     Utc::now(),
    /// )
    /// .expect("valid payload");
    /// assert_eq!(draft.status(), PrescriptionStatus::Draft);
    /// ```
    pub fn draft(
        id: PrescriptionId,
        doctor_id: DoctorId,
        member_id: MemberId,
        payload: PrescriptionPayload,
        now: DateTime<Utc>,
    ) -> Result<Self, PrescriptionValidationError> {
        payload.validate()?;
        let number = format!("ORD-{}-{}", now.format("%Y%m%d"), short_hex(id.as_uuid()));
        Ok(Self {
            id,
            number,
            doctor_id,
            member_id,
            payload,
            status: PrescriptionStatus::Draft,
            created_at: now,
            issued_at: None,
            revoked_at: None,
        })
    }

    /// Prescription identifier.
    pub const fn id(&self) -> PrescriptionId {
        self.id
    }

    /// Human-readable number (`ORD-YYYYMMDD-xxxxxxxx`).
    pub fn number(&self) -> &str {
        self.number.as_str()
    }

    /// Authoring doctor.
    pub const fn doctor_id(&self) -> DoctorId {
        self.doctor_id
    }

    /// Member the order is for.
    pub const fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// Doctor-authored content.
    pub const fn payload(&self) -> &PrescriptionPayload {
        &self.payload
    }

    /// Lifecycle status.
    pub const fn status(&self) -> PrescriptionStatus {
        self.status
    }

    /// Creation time.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the prescription was issued, if it has been.
    pub const fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// Time the prescription was revoked, if it has been.
    pub const fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Sharing policy carried by the payload.
    pub const fn sharing_scope(&self) -> SharingScope {
        self.payload.sharing_scope
    }

    /// Replace the content of a draft.
    pub fn replace_payload(
        &mut self,
        payload: PrescriptionPayload,
    ) -> Result<(), PrescriptionEditError> {
        if self.status != PrescriptionStatus::Draft {
            return Err(PrescriptionEditError::Transition(PrescriptionTransitionError {
                action: "edit",
                status: self.status,
            }));
        }
        payload.validate().map_err(PrescriptionEditError::Invalid)?;
        self.payload = payload;
        Ok(())
    }

    /// Draft → Issued.
    pub fn issue(&mut self, now: DateTime<Utc>) -> Result<(), PrescriptionTransitionError> {
        if self.status != PrescriptionStatus::Draft {
            return Err(PrescriptionTransitionError {
                action: "issue",
                status: self.status,
            });
        }
        self.status = PrescriptionStatus::Issued;
        self.issued_at = Some(now);
        Ok(())
    }

    /// Mark revoked. Returns `false` when it already was.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == PrescriptionStatus::Revoked {
            return false;
        }
        self.status = PrescriptionStatus::Revoked;
        self.revoked_at = Some(now);
        true
    }
}

/// Failures when editing a draft's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrescriptionEditError {
    /// The prescription is no longer a draft.
    Transition(PrescriptionTransitionError),
    /// The replacement payload is invalid.
    Invalid(PrescriptionValidationError),
}

impl fmt::Display for PrescriptionEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition(err) => err.fmt(f),
            Self::Invalid(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for PrescriptionEditError {}

/// Visibility edge from a prescription to a pharmacist.
///
/// The `(prescription_id, pharmacist_id)` pair is unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingGrant {
    /// Shared prescription.
    pub prescription_id: PrescriptionId,
    /// Recipient pharmacist.
    pub pharmacist_id: PharmacistId,
    /// When the grant was created.
    pub granted_at: DateTime<Utc>,
    /// Mirrors the prescription's revocation.
    #[serde(default)]
    pub revoked: bool,
    /// When the grant was flagged revoked.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SharingGrant {
    /// Live grant created at `now`.
    pub const fn new(
        prescription_id: PrescriptionId,
        pharmacist_id: PharmacistId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            prescription_id,
            pharmacist_id,
            granted_at: now,
            revoked: false,
            revoked_at: None,
        }
    }
}
