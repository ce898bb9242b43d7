//! Tests for the reconciliation scheduler.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    ContributionRepository, ContributionRepositoryError, FixtureCheckpointRepository,
    FixtureContributionRepository, FixturePharmacistRoster, FixturePrescriptionRepository,
    FixtureSharingGrantRepository, FixtureSyncQueue, FixtureVerificationSnapshotRepository,
    MockContributionRepository, MockPrescriptionRepository, PrescriptionRepository,
    PrescriptionRepositoryError,
};
use crate::domain::sharing_service::SharingServicePorts;
use crate::domain::verification_service::VerificationServicePorts;
use crate::domain::ErrorCode;
use crate::test_support::runtime::{MutableClock, RecordingSleeper};

#[fixture]
fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::at_noon(2025, 2, 1))
}

fn contributions(
    records: Arc<dyn ContributionRepository>,
    clock: Arc<MutableClock>,
) -> Arc<ContributionService> {
    Arc::new(ContributionService::new(records, clock, 0))
}

fn sharing(
    prescriptions: Arc<dyn PrescriptionRepository>,
    clock: Arc<MutableClock>,
) -> Arc<SharingService> {
    Arc::new(SharingService::new(
        SharingServicePorts {
            prescriptions,
            grants: Arc::new(FixtureSharingGrantRepository),
            roster: Arc::new(FixturePharmacistRoster),
            checkpoints: Arc::new(FixtureCheckpointRepository),
        },
        clock,
    ))
}

fn verification(clock: Arc<MutableClock>) -> Arc<VerificationService> {
    Arc::new(VerificationService::new(
        VerificationServicePorts {
            records: Arc::new(FixtureContributionRepository),
            versions: Arc::new(FixtureContributionRepository),
            snapshots: Arc::new(FixtureVerificationSnapshotRepository),
            queue: Arc::new(FixtureSyncQueue),
            checkpoints: Arc::new(FixtureCheckpointRepository),
        },
        clock,
    ))
}

fn scheduler(
    clock: Arc<MutableClock>,
    sleeper: Arc<RecordingSleeper>,
    config: SchedulerConfig,
) -> ReconciliationScheduler {
    ReconciliationScheduler::new(
        contributions(Arc::new(FixtureContributionRepository), Arc::clone(&clock)),
        sharing(Arc::new(FixturePrescriptionRepository), Arc::clone(&clock)),
        verification(clock),
        sleeper,
        CancellationFlag::new(),
        config,
    )
}

#[rstest]
#[tokio::test]
async fn cycle_on_empty_stores_is_clean(clock: Arc<MutableClock>) {
    let scheduler = scheduler(
        clock,
        Arc::new(RecordingSleeper::default()),
        SchedulerConfig::default(),
    );
    let report = scheduler.run_cycle(1).await;
    assert_eq!(report.cycle, 1);
    assert!(report.due_dates.is_clean());
    assert!(report.sharing.is_clean());
    assert!(report.drift.is_clean());
    assert!(!report.has_errors());
}

#[rstest]
#[tokio::test]
async fn failing_job_does_not_stop_the_others(clock: Arc<MutableClock>) {
    let mut prescriptions = MockPrescriptionRepository::new();
    prescriptions
        .expect_list_shareable_after()
        .returning(|_, _| Err(PrescriptionRepositoryError::connection("refused")));
    let scheduler = ReconciliationScheduler::new(
        contributions(Arc::new(FixtureContributionRepository), Arc::clone(&clock)),
        sharing(Arc::new(prescriptions), Arc::clone(&clock)),
        verification(clock),
        Arc::new(RecordingSleeper::default()),
        CancellationFlag::new(),
        SchedulerConfig::default(),
    );

    let report = scheduler.run_cycle(1).await;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].job, "sharing");
    assert_eq!(report.failures[0].error.code(), ErrorCode::StoreUnavailable);
    assert!(report.drift.is_clean());
    assert!(report.has_errors());
}

#[rstest]
#[tokio::test]
async fn failing_due_date_sweep_is_reported_by_name(clock: Arc<MutableClock>) {
    let mut records = MockContributionRepository::new();
    records
        .expect_list_versions_after()
        .returning(|_, _| Err(ContributionRepositoryError::connection("refused")));
    let scheduler = ReconciliationScheduler::new(
        contributions(Arc::new(records), Arc::clone(&clock)),
        sharing(Arc::new(FixturePrescriptionRepository), Arc::clone(&clock)),
        verification(clock),
        Arc::new(RecordingSleeper::default()),
        CancellationFlag::new(),
        SchedulerConfig::default(),
    );

    let report = scheduler.run_cycle(1).await;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].job, "due_dates");
    assert_eq!(report.failures[0].error.code(), ErrorCode::StoreUnavailable);
    assert!(report.sharing.is_clean());
    assert!(report.drift.is_clean());
}

#[rstest]
#[tokio::test]
async fn run_stops_after_max_cycles_and_sleeps_between(clock: Arc<MutableClock>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let scheduler = scheduler(
        clock,
        Arc::clone(&sleeper),
        SchedulerConfig {
            interval: Duration::from_secs(60),
            max_cycles: Some(3),
            resync_batch: 10,
        },
    );

    let mut seen = Vec::new();
    let cycles = scheduler.run(|report| seen.push(report.cycle)).await;
    assert_eq!(cycles, 3);
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(60); 2]);
}

#[rstest]
#[tokio::test]
async fn cancelled_scheduler_runs_no_cycle(clock: Arc<MutableClock>) {
    let scheduler = scheduler(
        clock,
        Arc::new(RecordingSleeper::default()),
        SchedulerConfig::default(),
    );
    scheduler.cancellation().cancel();
    let cycles = scheduler.run(|_| panic!("no cycle expected")).await;
    assert_eq!(cycles, 0);
}

#[rstest]
#[tokio::test]
async fn cancelling_from_the_callback_stops_after_that_cycle(clock: Arc<MutableClock>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let scheduler = scheduler(clock, Arc::clone(&sleeper), SchedulerConfig::default());
    let handle = scheduler.cancellation();

    let cycles = scheduler
        .run(|report| {
            if report.cycle == 2 {
                handle.cancel();
            }
        })
        .await;
    assert_eq!(cycles, 2);
    assert_eq!(sleeper.recorded().len(), 1);
}

#[rstest]
fn report_serialises_without_empty_failures() {
    let value = serde_json::to_value(CycleReport {
        cycle: 4,
        ..CycleReport::default()
    })
    .expect("serialise report");
    assert_eq!(value["cycle"], 4);
    assert!(value.get("failures").is_none());
    assert_eq!(value["sharing"]["fixed"], 0);
    assert_eq!(value["due_dates"]["scanned"], 0);
}
