//! Periodic orchestration of the repair jobs.
//!
//! One cycle runs the due-date sweep, then sharing reconciliation, then
//! drift detection, then one batch of the resync queue. The sweep goes
//! first so records it moves to Overdue are picked up by drift detection
//! and resynced in the same cycle. A failing job is reported and does not stop
//! the jobs after it; every job is idempotent, so the next cycle retries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::domain::{
    CancellationFlag, ContributionService, DomainError, ReconciliationSummary, SharingService,
    Sleeper, VerificationService,
};

/// Cadence and bounds of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause between cycles.
    pub interval: Duration,
    /// Stop after this many cycles; unbounded when `None`.
    pub max_cycles: Option<u64>,
    /// Members resynced per cycle.
    pub resync_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_cycles: None,
            resync_batch: 100,
        }
    }
}

/// A job that failed outright during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    /// Job name.
    pub job: &'static str,
    /// Failure reported by the job.
    pub error: DomainError,
}

/// Summaries of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Sequence number, starting at 1.
    pub cycle: u64,
    /// Active → Overdue transitions of lapsed records.
    pub due_dates: ReconciliationSummary,
    /// Grant backfill and revocation mirroring.
    pub sharing: ReconciliationSummary,
    /// Drift detection.
    pub drift: ReconciliationSummary,
    /// Snapshot resync from the queue.
    pub resync: ReconciliationSummary,
    /// Jobs that failed before producing a summary.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JobFailure>,
}

/// Runs the repair jobs on a cadence.
pub struct ReconciliationScheduler {
    contributions: Arc<ContributionService>,
    sharing: Arc<SharingService>,
    verification: Arc<VerificationService>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationFlag,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    /// Build a scheduler; `cancel` stops it between batches and cycles.
    pub fn new(
        contributions: Arc<ContributionService>,
        sharing: Arc<SharingService>,
        verification: Arc<VerificationService>,
        sleeper: Arc<dyn Sleeper>,
        cancel: CancellationFlag,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            contributions,
            sharing,
            verification,
            sleeper,
            cancel,
            config,
        }
    }

    /// Handle that cancels this scheduler.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Run every job once.
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        match self.contributions.sweep_due_dates(&self.cancel).await {
            Ok(summary) => report.due_dates = summary,
            Err(err) => report.record_failure("due_dates", err),
        }
        match self.sharing.reconcile_sharing(&self.cancel).await {
            Ok(summary) => report.sharing = summary,
            Err(err) => report.record_failure("sharing", err),
        }
        match self.verification.detect_drift(&self.cancel).await {
            Ok(summary) => report.drift = summary,
            Err(err) => report.record_failure("drift", err),
        }
        if !self.cancel.is_cancelled() {
            match self
                .verification
                .process_sync_queue(self.config.resync_batch)
                .await
            {
                Ok(summary) => report.resync = summary,
                Err(err) => report.record_failure("resync", err),
            }
        }

        info!(
            cycle,
            overdue = report.due_dates.fixed,
            sharing_fixed = report.sharing.fixed,
            drift_fixed = report.drift.fixed,
            resynced = report.resync.fixed,
            failures = report.failures.len(),
            "reconciliation cycle finished"
        );
        report
    }

    /// Run cycles until cancelled or `max_cycles` is reached, handing each
    /// report to `on_cycle`. Returns the number of cycles run.
    pub async fn run<F>(&self, mut on_cycle: F) -> u64
    where
        F: FnMut(&CycleReport) + Send,
    {
        let mut cycles = 0_u64;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            cycles += 1;
            let report = self.run_cycle(cycles).await;
            on_cycle(&report);

            if self
                .config
                .max_cycles
                .is_some_and(|max_cycles| cycles >= max_cycles)
                || self.cancel.is_cancelled()
            {
                break;
            }
            self.sleeper.sleep(self.config.interval).await;
        }
        info!(cycles, "reconciliation scheduler stopped");
        cycles
    }
}

impl CycleReport {
    fn record_failure(&mut self, job: &'static str, err: DomainError) {
        error!(job, error = %err, "reconciliation job failed");
        self.failures.push(JobFailure { job, error: err });
    }

    /// Whether any job failed or counted item errors.
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
            || self.due_dates.errors > 0
            || self.sharing.errors > 0
            || self.drift.errors > 0
            || self.resync.errors > 0
    }
}

#[cfg(test)]
#[path = "reconciliation_scheduler_tests.rs"]
mod tests;
