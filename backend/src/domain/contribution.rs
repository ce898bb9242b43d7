//! Insurer-authoritative contribution records.
//!
//! One record per member holds every contribution period the insurer has
//! billed. Each mutation bumps `version` by exactly one; the store accepts a
//! write only when the stored version is the one the mutation started from,
//! so a member's record has a single linear version lineage.
//!
//! State machine:
//! Draft →(record)→ Active →(due-date check)→ Overdue;
//! Active/Overdue →(payment settles every period)→ Paid;
//! Paid →(administrative close)→ Archived.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::short_hex;
use super::{InsurerId, MemberId};

/// Monetary amount in FCFA (no minor unit).
pub type Amount = i64;

/// Tariff of a standard monthly contribution.
pub const STANDARD_CONTRIBUTION: Amount = 5_000;
/// Tariff of a maternity monthly contribution.
pub const MATERNITY_CONTRIBUTION: Amount = 7_500;

/// Contribution tariff category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    /// Standard contribution.
    #[default]
    Standard,
    /// Contribution for a pregnant member.
    Maternity,
}

impl ContributionKind {
    /// Tariff amount for the category.
    pub const fn default_amount(self) -> Amount {
        match self {
            Self::Standard => STANDARD_CONTRIBUTION,
            Self::Maternity => MATERNITY_CONTRIBUTION,
        }
    }
}

/// Record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    /// Created, nothing billed yet.
    Draft,
    /// Billed, nothing past due.
    Active,
    /// A due date passed with debt outstanding.
    Overdue,
    /// Every billed period is settled.
    Paid,
    /// Administratively closed.
    Archived,
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
            Self::Archived => "archived",
        })
    }
}

/// One billed period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionPeriod {
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
    /// Payment deadline.
    pub due_date: NaiveDate,
    /// Amount billed.
    pub amount: Amount,
    /// Tariff category.
    #[serde(default)]
    pub kind: ContributionKind,
    /// Human-readable reference (`COT-YYYYMM-xxxxxxxx`).
    pub reference: String,
    /// Settlement date, once paid.
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
}

impl ContributionPeriod {
    /// Whether the period still counts towards the debt.
    pub const fn is_unpaid(&self) -> bool {
        self.paid_on.is_none()
    }
}

/// Input for billing a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    /// Amount billed; must be positive.
    pub amount: Amount,
    /// Tariff category.
    pub kind: ContributionKind,
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
}

/// Rejected contribution mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionError {
    /// The billed amount was zero or negative.
    NonPositiveAmount(Amount),
    /// The period ends before it starts.
    InvalidPeriod {
        /// First day.
        period_start: NaiveDate,
        /// Last day.
        period_end: NaiveDate,
    },
    /// The period was already settled.
    PeriodAlreadyPaid(NaiveDate),
    /// No period starts on this date.
    UnknownPeriod(NaiveDate),
    /// The state machine does not allow the action from this status.
    InvalidTransition {
        /// Action attempted.
        action: &'static str,
        /// Current status.
        status: ContributionStatus,
    },
}

impl fmt::Display for ContributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount(amount) => {
                write!(f, "contribution amount must be positive, got {amount}")
            }
            Self::InvalidPeriod {
                period_start,
                period_end,
            } => write!(f, "period end {period_end} precedes period start {period_start}"),
            Self::PeriodAlreadyPaid(start) => write!(f, "period starting {start} is already paid"),
            Self::UnknownPeriod(start) => write!(f, "no contribution period starts on {start}"),
            Self::InvalidTransition { action, status } => {
                write!(f, "cannot {action} a {status} contribution record")
            }
        }
    }
}

impl std::error::Error for ContributionError {}

/// Authoritative contribution record of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    member_id: MemberId,
    insurer_id: InsurerId,
    #[serde(default)]
    periods: Vec<ContributionPeriod>,
    status: ContributionStatus,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl ContributionRecord {
    /// Empty Draft record, version 0 (not yet stored).
    pub const fn new(member_id: MemberId, insurer_id: InsurerId, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            insurer_id,
            periods: Vec::new(),
            status: ContributionStatus::Draft,
            version: 0,
            updated_at: now,
        }
    }

    /// Member the record belongs to.
    pub const fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// Owning insurer.
    pub const fn insurer_id(&self) -> InsurerId {
        self.insurer_id
    }

    /// Billed periods, ordered by start date.
    pub fn periods(&self) -> &[ContributionPeriod] {
        &self.periods
    }

    /// Current status.
    pub const fn status(&self) -> ContributionStatus {
        self.status
    }

    /// Monotonic version; bumped once per mutation.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Time of the last mutation.
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sum of unpaid period amounts, floored at zero.
    pub fn debt(&self) -> Amount {
        self.periods
            .iter()
            .filter(|period| period.is_unpaid())
            .fold(0, |total: Amount, period| total.saturating_add(period.amount))
            .max(0)
    }

    /// Earliest due date among unpaid periods.
    pub fn next_due_date(&self) -> Option<NaiveDate> {
        self.periods
            .iter()
            .filter(|period| period.is_unpaid())
            .map(|period| period.due_date)
            .min()
    }

    /// Most recent settlement date.
    pub fn last_payment_on(&self) -> Option<NaiveDate> {
        self.periods.iter().filter_map(|period| period.paid_on).max()
    }

    /// Bill a period, or re-price an unpaid one starting on the same day.
    pub fn record_period(
        &mut self,
        entry: &NewContribution,
        grace_days: u32,
        now: DateTime<Utc>,
    ) -> Result<(), ContributionError> {
        if entry.amount <= 0 {
            return Err(ContributionError::NonPositiveAmount(entry.amount));
        }
        if entry.period_end < entry.period_start {
            return Err(ContributionError::InvalidPeriod {
                period_start: entry.period_start,
                period_end: entry.period_end,
            });
        }
        if self.status == ContributionStatus::Archived {
            return Err(ContributionError::InvalidTransition {
                action: "record a contribution on",
                status: self.status,
            });
        }

        let due_date = entry
            .period_end
            .checked_add_days(Days::new(u64::from(grace_days)))
            .unwrap_or(entry.period_end);

        match self
            .periods
            .iter_mut()
            .find(|period| period.period_start == entry.period_start)
        {
            Some(existing) if !existing.is_unpaid() => {
                return Err(ContributionError::PeriodAlreadyPaid(entry.period_start));
            }
            Some(existing) => {
                existing.period_end = entry.period_end;
                existing.due_date = due_date;
                existing.amount = entry.amount;
                existing.kind = entry.kind;
            }
            None => {
                self.periods.push(ContributionPeriod {
                    period_start: entry.period_start,
                    period_end: entry.period_end,
                    due_date,
                    amount: entry.amount,
                    kind: entry.kind,
                    reference: contribution_reference(self.member_id, entry.period_start),
                    paid_on: None,
                });
                self.periods.sort_by_key(|period| period.period_start);
            }
        }

        if matches!(
            self.status,
            ContributionStatus::Draft | ContributionStatus::Paid
        ) {
            self.status = ContributionStatus::Active;
        }
        self.bump(now);
        Ok(())
    }

    /// Settle the period starting on `period_start`.
    pub fn apply_payment(
        &mut self,
        period_start: NaiveDate,
        paid_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), ContributionError> {
        if !matches!(
            self.status,
            ContributionStatus::Active | ContributionStatus::Overdue
        ) {
            return Err(ContributionError::InvalidTransition {
                action: "apply a payment to",
                status: self.status,
            });
        }
        let period = self
            .periods
            .iter_mut()
            .find(|period| period.period_start == period_start)
            .ok_or(ContributionError::UnknownPeriod(period_start))?;
        if !period.is_unpaid() {
            return Err(ContributionError::PeriodAlreadyPaid(period_start));
        }
        period.paid_on = Some(paid_on);

        self.status = if self.periods.iter().all(|period| !period.is_unpaid()) {
            ContributionStatus::Paid
        } else if self.has_unpaid_due_before(now.date_naive()) {
            ContributionStatus::Overdue
        } else {
            ContributionStatus::Active
        };
        self.bump(now);
        Ok(())
    }

    /// Active → Overdue when an unpaid period's due date is before `today`.
    ///
    /// Returns whether the record changed.
    pub fn apply_due_date_check(
        &mut self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool, ContributionError> {
        match self.status {
            ContributionStatus::Active if self.has_unpaid_due_before(today) => {
                self.status = ContributionStatus::Overdue;
                self.bump(now);
                Ok(true)
            }
            ContributionStatus::Archived => Err(ContributionError::InvalidTransition {
                action: "check due dates of",
                status: self.status,
            }),
            _ => Ok(false),
        }
    }

    /// Paid → Archived.
    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), ContributionError> {
        if self.status != ContributionStatus::Paid {
            return Err(ContributionError::InvalidTransition {
                action: "archive",
                status: self.status,
            });
        }
        self.status = ContributionStatus::Archived;
        self.bump(now);
        Ok(())
    }

    fn has_unpaid_due_before(&self, day: NaiveDate) -> bool {
        self.periods
            .iter()
            .any(|period| period.is_unpaid() && period.due_date < day)
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
    }
}

/// Reference of the period starting on `period_start` for `member_id`.
pub fn contribution_reference(member_id: MemberId, period_start: NaiveDate) -> String {
    format!(
        "COT-{:04}{:02}-{}",
        period_start.year(),
        period_start.month(),
        short_hex(member_id.as_uuid())
    )
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
    }

    fn january() -> NewContribution {
        NewContribution {
            amount: STANDARD_CONTRIBUTION,
            kind: ContributionKind::Standard,
            period_start: date(1, 1),
            period_end: date(1, 31),
        }
    }

    fn february() -> NewContribution {
        NewContribution {
            amount: MATERNITY_CONTRIBUTION,
            kind: ContributionKind::Maternity,
            period_start: date(2, 1),
            period_end: date(2, 28),
        }
    }

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, 8, 0, 0)
            .single()
            .expect("valid time")
    }

    #[fixture]
    fn now() -> DateTime<Utc> {
        at(1, 5)
    }

    #[fixture]
    fn record(now: DateTime<Utc>) -> ContributionRecord {
        ContributionRecord::new(MemberId::random(), InsurerId::random(), now)
    }

    #[rstest]
    fn recording_activates_and_bumps_version(mut record: ContributionRecord, now: DateTime<Utc>) {
        record
            .record_period(&january(), 0, now)
            .expect("record january");
        assert_eq!(record.status(), ContributionStatus::Active);
        assert_eq!(record.version(), 1);
        assert_eq!(record.debt(), 5_000);
        assert_eq!(record.next_due_date(), Some(date(1, 31)));
    }

    #[rstest]
    fn grace_days_push_due_date(mut record: ContributionRecord, now: DateTime<Utc>) {
        record
            .record_period(&january(), 10, now)
            .expect("record january");
        assert_eq!(record.next_due_date(), Some(date(2, 10)));
    }

    #[rstest]
    fn re_recording_unpaid_period_reprices_it(mut record: ContributionRecord, now: DateTime<Utc>) {
        record.record_period(&january(), 0, now).expect("first");
        let mut repriced = january();
        repriced.amount = 6_000;
        record.record_period(&repriced, 0, now).expect("reprice");
        assert_eq!(record.periods().len(), 1);
        assert_eq!(record.debt(), 6_000);
        assert_eq!(record.version(), 2);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    fn rejects_non_positive_amounts(
        mut record: ContributionRecord,
        now: DateTime<Utc>,
        #[case] amount: Amount,
    ) {
        let mut entry = january();
        entry.amount = amount;
        let err = record.record_period(&entry, 0, now).expect_err("invalid amount");
        assert_eq!(err, ContributionError::NonPositiveAmount(amount));
        assert_eq!(record.version(), 0);
    }

    #[rstest]
    fn payment_of_last_period_marks_paid(mut record: ContributionRecord, now: DateTime<Utc>) {
        record.record_period(&january(), 0, now).expect("record");
        record
            .apply_payment(date(1, 1), date(2, 3), now)
            .expect("pay january");
        assert_eq!(record.status(), ContributionStatus::Paid);
        assert_eq!(record.debt(), 0);
        assert_eq!(record.version(), 2);
        assert_eq!(record.last_payment_on(), Some(date(2, 3)));
        assert!(record.next_due_date().is_none());
    }

    #[rstest]
    fn partial_payment_keeps_overdue_when_older_debt_remains(
        mut record: ContributionRecord,
        now: DateTime<Utc>,
    ) {
        record.record_period(&january(), 0, now).expect("january");
        record.record_period(&february(), 0, now).expect("february");
        assert!(
            record
                .apply_due_date_check(date(2, 5), now)
                .expect("check due dates")
        );
        assert_eq!(record.status(), ContributionStatus::Overdue);

        record
            .apply_payment(date(2, 1), date(2, 6), at(2, 6))
            .expect("pay february first");
        assert_eq!(record.status(), ContributionStatus::Overdue);
        assert_eq!(record.debt(), STANDARD_CONTRIBUTION);

        record
            .apply_payment(date(1, 1), date(2, 7), at(2, 7))
            .expect("pay january");
        assert_eq!(record.status(), ContributionStatus::Paid);
    }

    #[rstest]
    fn back_dated_payment_judges_remaining_debt_against_today(
        mut record: ContributionRecord,
        now: DateTime<Utc>,
    ) {
        record.record_period(&january(), 0, now).expect("january");
        record.record_period(&february(), 0, now).expect("february");

        // Settled on 25 January, entered on 10 February.
        record
            .apply_payment(date(2, 1), date(1, 25), at(2, 10))
            .expect("pay february");
        assert_eq!(record.status(), ContributionStatus::Overdue);
        assert_eq!(record.next_due_date(), Some(date(1, 31)));
    }

    #[rstest]
    fn early_payment_leaves_record_active(mut record: ContributionRecord, now: DateTime<Utc>) {
        record.record_period(&january(), 0, now).expect("january");
        record.record_period(&february(), 0, now).expect("february");
        record
            .apply_payment(date(2, 1), date(1, 20), at(1, 20))
            .expect("pay february");
        assert_eq!(record.status(), ContributionStatus::Active);
    }

    #[rstest]
    fn due_date_check_is_a_no_op_before_deadline(
        mut record: ContributionRecord,
        now: DateTime<Utc>,
    ) {
        record.record_period(&january(), 0, now).expect("january");
        let changed = record
            .apply_due_date_check(date(1, 31), now)
            .expect("check");
        assert!(!changed);
        assert_eq!(record.version(), 1);
    }

    #[rstest]
    fn paying_twice_is_rejected(mut record: ContributionRecord, now: DateTime<Utc>) {
        record.record_period(&january(), 0, now).expect("january");
        record.record_period(&february(), 0, now).expect("february");
        record
            .apply_payment(date(1, 1), date(1, 20), now)
            .expect("pay");
        let err = record
            .apply_payment(date(1, 1), date(1, 21), now)
            .expect_err("already paid");
        assert_eq!(err, ContributionError::PeriodAlreadyPaid(date(1, 1)));
    }

    #[rstest]
    fn archive_only_from_paid(mut record: ContributionRecord, now: DateTime<Utc>) {
        record.record_period(&january(), 0, now).expect("january");
        assert!(matches!(
            record.archive(now),
            Err(ContributionError::InvalidTransition { .. })
        ));
        record
            .apply_payment(date(1, 1), date(1, 20), now)
            .expect("pay");
        record.archive(now).expect("archive paid record");
        assert_eq!(record.status(), ContributionStatus::Archived);
        assert!(record.record_period(&february(), 0, now).is_err());
    }

    #[rstest]
    fn reference_uses_period_month_and_member_prefix() {
        let member = MemberId::new("deadbeef-0000-4000-8000-000000000000").expect("valid id");
        assert_eq!(
            contribution_reference(member, date(3, 1)),
            "COT-202503-deadbeef"
        );
    }
}
