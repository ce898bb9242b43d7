//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (role stores, prescription and contribution stores, the resync queue,
//! checkpoint storage). Each trait exposes a strongly typed error so adapters
//! map their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod checkpoint_repository;
mod contribution_repository;
mod pharmacist_roster;
mod prescription_repository;
mod role_directory;
mod sharing_grant_repository;
mod sync_queue;
mod verification_snapshot_repository;

#[cfg(test)]
pub use checkpoint_repository::MockCheckpointRepository;
pub use checkpoint_repository::{
    CheckpointRepository, CheckpointRepositoryError, FixtureCheckpointRepository,
};
#[cfg(test)]
pub use contribution_repository::{MockContributionRepository, MockContributionVersionSource};
pub use contribution_repository::{
    ContributionRepository, ContributionRepositoryError, ContributionVersionSource,
    FixtureContributionRepository, RecordVersion,
};
#[cfg(test)]
pub use pharmacist_roster::MockPharmacistRoster;
pub use pharmacist_roster::{FixturePharmacistRoster, PharmacistRoster, PharmacistRosterError};
#[cfg(test)]
pub use prescription_repository::MockPrescriptionRepository;
pub use prescription_repository::{
    FixturePrescriptionRepository, PrescriptionRepository, PrescriptionRepositoryError,
};
#[cfg(test)]
pub use role_directory::MockRoleDirectory;
pub use role_directory::{FixtureRoleDirectory, RoleDirectory, RoleStoreError};
#[cfg(test)]
pub use sharing_grant_repository::MockSharingGrantRepository;
pub use sharing_grant_repository::{
    FixtureSharingGrantRepository, GrantInsertOutcome, SharingGrantRepository,
    SharingGrantRepositoryError,
};
#[cfg(test)]
pub use sync_queue::MockSyncQueue;
pub use sync_queue::{FixtureSyncQueue, SyncQueue, SyncQueueError};
#[cfg(test)]
pub use verification_snapshot_repository::MockVerificationSnapshotRepository;
pub use verification_snapshot_repository::{
    FixtureVerificationSnapshotRepository, VerificationSnapshotRepository,
    VerificationSnapshotRepositoryError,
};
