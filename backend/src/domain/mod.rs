//! Domain primitives, aggregates and services.
//!
//! Purpose: resolve accounts to role profiles, propagate prescriptions to
//! pharmacists through explicit grants, and keep the agent-facing
//! verification cache consistent with the insurer's contribution records.
//! Everything here is transport and storage agnostic; stores are reached
//! through the traits in [`ports`].
//!
//! Public surface:
//! - DomainError and ErrorCode: stable failure taxonomy.
//! - ProfileResolver: account → role profile.
//! - SharingService: prescriptions and grants.
//! - ContributionService / VerificationService: records and snapshots.
//! - ReconciliationScheduler: periodic repair orchestration.

pub mod contribution;
pub mod contribution_service;
pub mod error;
pub mod ids;
pub mod ports;
pub mod prescription;
pub mod profile_resolver;
pub mod reconciliation;
pub mod reconciliation_scheduler;
pub mod retry;
pub mod role;
pub mod sharing_service;
pub mod verification;
pub mod verification_service;

pub use self::contribution::{
    Amount, ContributionError, ContributionKind, ContributionPeriod, ContributionRecord,
    ContributionStatus, MATERNITY_CONTRIBUTION, NewContribution, STANDARD_CONTRIBUTION,
    contribution_reference,
};
pub use self::contribution_service::{
    ContributionService, DEFAULT_SWEEP_BATCH_SIZE, PaymentRequest, RecordContributionRequest,
};
pub use self::error::{DomainError, DomainErrorValidationError, ErrorCode};
pub use self::ids::{
    AccountId, AgentId, DoctorId, IdValidationError, InsurerId, MemberId, PharmacistId,
    PrescriptionId,
};
pub use self::prescription::{
    DEFAULT_TREATMENT_DAYS, Prescription, PrescriptionEditError, PrescriptionKind,
    PrescriptionPayload, PrescriptionStatus, PrescriptionTransitionError,
    PrescriptionValidationError, SharingGrant, SharingScope,
};
pub use self::profile_resolver::{ProfileResolver, RoleResolution};
pub use self::reconciliation::{CancellationFlag, ReconciliationJob, ReconciliationSummary};
pub use self::reconciliation_scheduler::{
    CycleReport, JobFailure, ReconciliationScheduler, SchedulerConfig,
};
pub use self::retry::{AttemptJitter, BackoffJitter, RetryPolicy, RetryRuntime, Sleeper, TokioSleeper};
pub use self::role::{
    AgentProfile, DoctorProfile, InsurerProfile, MemberProfile, PharmacistProfile, RoleKind,
    RoleProfile,
};
pub use self::sharing_service::{
    DEFAULT_SHARING_BATCH_SIZE, RevokeOutcome, ShareOutcome, SharingService, SharingServicePorts,
    VisiblePrescription,
};
pub use self::verification::{Freshness, SnapshotView, VerificationSnapshot, VerificationStatus};
pub use self::verification_service::{
    DEFAULT_DRIFT_BATCH_SIZE, VerificationService, VerificationServicePorts,
};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use mutuelle_sync::domain::{DomainError, DomainResult};
///
/// fn lookup() -> DomainResult<u32> {
///     Err(DomainError::not_found("prescription", "42"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, DomainError>;
