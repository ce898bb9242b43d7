//! Insurer-side operations on contribution records.
//!
//! Every operation loads the member's record, applies one state-machine
//! step and writes it back with a compare-and-set on the version it read.
//! A lost race surfaces as `Conflict`; callers may reload and retry.
//!
//! Overdue is a stored status, so something has to notice that a due date
//! passed. [`ContributionService::sweep_due_dates`] walks every record in
//! member-id order and applies the due-date check; the scheduler runs it
//! ahead of drift detection so the resulting version bumps reach the
//! verification cache in the same cycle.

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::ports::{ContributionRepository, ContributionRepositoryError};
use crate::domain::{
    Amount, CancellationFlag, ContributionError, ContributionKind, ContributionRecord,
    ContributionStatus, DomainError, ErrorCode, InsurerId, MemberId, NewContribution,
    ReconciliationSummary,
};

/// Default number of records examined per due-date sweep batch.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

pub(crate) fn map_contribution_error(error: ContributionRepositoryError) -> DomainError {
    match error {
        ContributionRepositoryError::Connection { .. } => DomainError::store_unavailable("contribution"),
        ContributionRepositoryError::Query { message } => {
            DomainError::internal(format!("contribution repository error: {message}"))
        }
        err @ ContributionRepositoryError::VersionConflict { .. } => {
            DomainError::conflict(err.to_string())
        }
    }
}

fn map_rule_error(error: ContributionError) -> DomainError {
    match error {
        ContributionError::NonPositiveAmount(_) | ContributionError::InvalidPeriod { .. } => {
            DomainError::invalid_request(error.to_string())
        }
        ContributionError::UnknownPeriod(start) => DomainError::not_found("contribution period", start),
        ContributionError::PeriodAlreadyPaid(_) | ContributionError::InvalidTransition { .. } => {
            DomainError::conflict(error.to_string())
        }
    }
}

/// Billing of one contribution period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContributionRequest {
    /// Insurer owning the record.
    pub insurer_id: InsurerId,
    /// Member billed.
    pub member_id: MemberId,
    /// Amount billed; must be positive.
    pub amount: Amount,
    /// Tariff category.
    pub kind: ContributionKind,
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
}

/// Settlement of one billed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Insurer owning the record.
    pub insurer_id: InsurerId,
    /// Member paying.
    pub member_id: MemberId,
    /// Start of the period being settled.
    pub period_start: NaiveDate,
    /// Settlement date.
    pub paid_on: NaiveDate,
}

/// Authoritative contribution record operations.
pub struct ContributionService {
    records: Arc<dyn ContributionRepository>,
    clock: Arc<dyn Clock>,
    grace_days: u32,
    batch_size: usize,
}

impl ContributionService {
    /// Build the service; due dates fall `grace_days` after the period end.
    pub fn new(
        records: Arc<dyn ContributionRepository>,
        clock: Arc<dyn Clock>,
        grace_days: u32,
    ) -> Self {
        Self {
            records,
            clock,
            grace_days,
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }

    /// Override the due-date sweep batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Bill a period, creating the record on first use (Draft → Active).
    pub async fn record_contribution(
        &self,
        request: RecordContributionRequest,
    ) -> Result<ContributionRecord, DomainError> {
        let now = self.clock.utc();
        let mut record = match self.load(request.member_id).await? {
            Some(record) => ensure_owner(record, request.insurer_id)?,
            None => ContributionRecord::new(request.member_id, request.insurer_id, now),
        };

        record
            .record_period(
                &NewContribution {
                    amount: request.amount,
                    kind: request.kind,
                    period_start: request.period_start,
                    period_end: request.period_end,
                },
                self.grace_days,
                now,
            )
            .map_err(map_rule_error)?;
        self.store(&record).await?;
        info!(
            member = %request.member_id,
            version = record.version(),
            debt = record.debt(),
            "contribution recorded"
        );
        Ok(record)
    }

    /// Settle one period (Active/Overdue → Paid once nothing is unpaid).
    pub async fn record_payment(&self, request: PaymentRequest) -> Result<ContributionRecord, DomainError> {
        let record = self.require(request.member_id).await?;
        let mut record = ensure_owner(record, request.insurer_id)?;
        record
            .apply_payment(request.period_start, request.paid_on, self.clock.utc())
            .map_err(map_rule_error)?;
        self.store(&record).await?;
        info!(
            member = %request.member_id,
            version = record.version(),
            status = %record.status(),
            "payment recorded"
        );
        Ok(record)
    }

    /// Active → Overdue when a due date has passed with debt outstanding.
    ///
    /// Returns the record and whether it changed; an unchanged record is not
    /// rewritten.
    pub async fn apply_due_date_check(
        &self,
        member_id: MemberId,
    ) -> Result<(ContributionRecord, bool), DomainError> {
        let mut record = self.require(member_id).await?;
        let now = self.clock.utc();
        let changed = record
            .apply_due_date_check(now.date_naive(), now)
            .map_err(map_rule_error)?;
        if changed {
            self.store(&record).await?;
            info!(member = %member_id, version = record.version(), "contribution overdue");
        } else {
            debug!(member = %member_id, "due-date check left record unchanged");
        }
        Ok((record, changed))
    }

    /// Apply the due-date check to every stored record.
    ///
    /// `fixed` counts records moved to Overdue. Archived records are skipped.
    /// A record another writer moved first is left for the next sweep; any
    /// other failure is logged, counted in `errors` and the sweep continues.
    pub async fn sweep_due_dates(
        &self,
        cancel: &CancellationFlag,
    ) -> Result<ReconciliationSummary, DomainError> {
        let mut cursor = None;
        let mut summary = ReconciliationSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let batch = self
                .records
                .list_versions_after(cursor, self.batch_size)
                .await
                .map_err(map_contribution_error)?;
            let Some(last) = batch.last().map(|entry| entry.member_id) else {
                break;
            };

            for entry in &batch {
                summary.scanned += 1;
                match self.sweep_record(entry.member_id).await {
                    Ok(true) => summary.fixed += 1,
                    Ok(false) => {}
                    Err(error) if error.code() == ErrorCode::Conflict => {
                        debug!(member = %entry.member_id, "record moved during sweep");
                    }
                    Err(error) => {
                        summary.errors += 1;
                        warn!(
                            member = %entry.member_id,
                            error = %error,
                            "due-date check failed; continuing"
                        );
                    }
                }
            }

            cursor = Some(last);
            if batch.len() < self.batch_size {
                break;
            }
        }

        info!(
            scanned = summary.scanned,
            fixed = summary.fixed,
            errors = summary.errors,
            cancelled = summary.cancelled,
            "due-date sweep finished"
        );
        Ok(summary)
    }

    /// Paid → Archived.
    pub async fn archive_contribution(
        &self,
        insurer_id: InsurerId,
        member_id: MemberId,
    ) -> Result<ContributionRecord, DomainError> {
        let record = self.require(member_id).await?;
        let mut record = ensure_owner(record, insurer_id)?;
        record.archive(self.clock.utc()).map_err(map_rule_error)?;
        self.store(&record).await?;
        info!(member = %member_id, version = record.version(), "contribution archived");
        Ok(record)
    }

    async fn sweep_record(&self, member_id: MemberId) -> Result<bool, DomainError> {
        let Some(mut record) = self.load(member_id).await? else {
            return Ok(false);
        };
        if record.status() == ContributionStatus::Archived {
            return Ok(false);
        }
        let now = self.clock.utc();
        let changed = record
            .apply_due_date_check(now.date_naive(), now)
            .map_err(map_rule_error)?;
        if changed {
            self.store(&record).await?;
            info!(member = %member_id, version = record.version(), "contribution overdue");
        }
        Ok(changed)
    }

    async fn load(&self, member_id: MemberId) -> Result<Option<ContributionRecord>, DomainError> {
        self.records
            .find_by_member(&member_id)
            .await
            .map_err(map_contribution_error)
    }

    async fn require(&self, member_id: MemberId) -> Result<ContributionRecord, DomainError> {
        self.load(member_id)
            .await?
            .ok_or_else(|| DomainError::not_found("contribution record", member_id))
    }

    async fn store(&self, record: &ContributionRecord) -> Result<(), DomainError> {
        self.records.save(record).await.map_err(map_contribution_error)
    }
}

fn ensure_owner(record: ContributionRecord, insurer_id: InsurerId) -> Result<ContributionRecord, DomainError> {
    if record.insurer_id() != insurer_id {
        return Err(DomainError::conflict(format!(
            "contribution record of member {} belongs to another insurer",
            record.member_id()
        )));
    }
    Ok(record)
}
