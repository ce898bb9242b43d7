//! Role profiles and the explicit role priority order.
//!
//! An account owns at most one role profile. When the stores disagree and
//! more than one claims the same account, [`RoleKind::PRIORITY`] decides which
//! profile is served while the anomaly is reported.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, AgentId, DoctorId, InsurerId, MemberId, PharmacistId};

/// The five role families an account can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Insured member.
    Member,
    /// Prescribing doctor.
    Doctor,
    /// Dispensing pharmacist.
    Pharmacist,
    /// Insurer staff owning contribution records.
    Insurer,
    /// Field agent verifying contributions.
    Agent,
}

impl RoleKind {
    /// Resolution priority, highest first.
    pub const PRIORITY: [Self; 5] = [
        Self::Insurer,
        Self::Doctor,
        Self::Pharmacist,
        Self::Agent,
        Self::Member,
    ];

    /// Store name used in logs and `StoreUnavailable` errors.
    pub const fn store_name(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Doctor => "doctor",
            Self::Pharmacist => "pharmacist",
            Self::Insurer => "insurer",
            Self::Agent => "agent",
        }
    }

    /// Position in [`Self::PRIORITY`]; lower wins.
    pub const fn rank(self) -> usize {
        match self {
            Self::Insurer => 0,
            Self::Doctor => 1,
            Self::Pharmacist => 2,
            Self::Agent => 3,
            Self::Member => 4,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_name())
    }
}

/// Member profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Profile identifier.
    pub id: MemberId,
    /// Owning account.
    pub account_id: AccountId,
}

/// Doctor profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorProfile {
    /// Profile identifier.
    pub id: DoctorId,
    /// Owning account.
    pub account_id: AccountId,
}

/// Pharmacist profile.
///
/// Only active pharmacists receive prescription grants. `activated_at` is
/// informational; activation takes effect for sharing the moment `active`
/// flips, and reaches already-issued prescriptions at the next
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacistProfile {
    /// Profile identifier.
    pub id: PharmacistId,
    /// Owning account.
    pub account_id: AccountId,
    /// Whether the pharmacy is currently dispensing.
    pub active: bool,
    /// When the pharmacist last became active.
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

/// Insurer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurerProfile {
    /// Profile identifier.
    pub id: InsurerId,
    /// Owning account.
    pub account_id: AccountId,
}

/// Field agent profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Profile identifier.
    pub id: AgentId,
    /// Owning account.
    pub account_id: AccountId,
}

/// Tagged union over the role profiles an account can own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    /// Member variant.
    Member(MemberProfile),
    /// Doctor variant.
    Doctor(DoctorProfile),
    /// Pharmacist variant.
    Pharmacist(PharmacistProfile),
    /// Insurer variant.
    Insurer(InsurerProfile),
    /// Agent variant.
    Agent(AgentProfile),
}

impl RoleProfile {
    /// Role family of this profile.
    pub const fn kind(&self) -> RoleKind {
        match self {
            Self::Member(_) => RoleKind::Member,
            Self::Doctor(_) => RoleKind::Doctor,
            Self::Pharmacist(_) => RoleKind::Pharmacist,
            Self::Insurer(_) => RoleKind::Insurer,
            Self::Agent(_) => RoleKind::Agent,
        }
    }

    /// Account owning this profile.
    pub const fn account_id(&self) -> AccountId {
        match self {
            Self::Member(profile) => profile.account_id,
            Self::Doctor(profile) => profile.account_id,
            Self::Pharmacist(profile) => profile.account_id,
            Self::Insurer(profile) => profile.account_id,
            Self::Agent(profile) => profile.account_id,
        }
    }
}
