//! Agent-facing verification snapshot.
//!
//! A snapshot is a cached projection of a member's contribution record. It
//! records the record version it was derived from in `source_version`; the
//! store never accepts a write that would move `source_version` backwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, ContributionRecord, MemberId};

/// Contribution standing shown to field agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No debt past its due date.
    UpToDate,
    /// Debt outstanding after the next due date.
    Overdue,
    /// No contribution record exists for the member.
    Unverified,
}

/// Whether a snapshot reflects the current authoritative version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// `source_version` equals the authoritative version.
    Fresh,
    /// The authoritative version moved on, or could not be read.
    Stale,
}

/// Cached verification state of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSnapshot {
    /// Member the snapshot describes.
    pub member_id: MemberId,
    /// Derived standing.
    pub status: VerificationStatus,
    /// Sum of unpaid amounts, floored at zero.
    pub debt: Amount,
    /// Earliest unpaid due date.
    #[serde(default)]
    pub next_due_date: Option<NaiveDate>,
    /// Days elapsed since `next_due_date` when overdue, else zero.
    #[serde(default)]
    pub days_overdue: u32,
    /// Most recent settlement date.
    #[serde(default)]
    pub last_payment_on: Option<NaiveDate>,
    /// Record version this snapshot reflects; 0 when no record existed.
    pub source_version: u64,
    /// When the snapshot was computed.
    pub synced_at: DateTime<Utc>,
}

impl VerificationSnapshot {
    /// Derive the snapshot for `member_id` from its record at `now`.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use mutuelle_sync::domain::{MemberId, VerificationSnapshot, VerificationStatus};
    ///
    /// let member = MemberId::random();
    /// let snapshot = VerificationSnapshot::derive(member, None, Utc::now());
    /// assert_eq!(snapshot.status, VerificationStatus::Unverified);
    /// assert_eq!(snapshot.source_version, 0);
    /// ```
    pub fn derive(
        member_id: MemberId,
        record: Option<&ContributionRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(record) = record else {
            return Self {
                member_id,
                status: VerificationStatus::Unverified,
                debt: 0,
                next_due_date: None,
                days_overdue: 0,
                last_payment_on: None,
                source_version: 0,
                synced_at: now,
            };
        };

        let today = now.date_naive();
        let debt = record.debt();
        let next_due_date = record.next_due_date();
        let days_overdue = match next_due_date {
            Some(due) if debt > 0 && today > due => {
                u32::try_from((today - due).num_days()).unwrap_or(u32::MAX)
            }
            _ => 0,
        };
        let status = if days_overdue > 0 {
            VerificationStatus::Overdue
        } else {
            VerificationStatus::UpToDate
        };

        Self {
            member_id,
            status,
            debt,
            next_due_date,
            days_overdue,
            last_payment_on: record.last_payment_on(),
            source_version: record.version(),
            synced_at: now,
        }
    }

    /// Freshness against the authoritative `current_version`.
    pub fn freshness_against(&self, current_version: Option<u64>) -> Freshness {
        match current_version {
            Some(version) if version == self.source_version => Freshness::Fresh,
            None if self.source_version == 0 => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }
}

/// Snapshot together with its freshness, as served to agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotView {
    /// Cached snapshot, shown with its `synced_at`.
    pub snapshot: VerificationSnapshot,
    /// Freshness at read time.
    pub freshness: Freshness,
}
