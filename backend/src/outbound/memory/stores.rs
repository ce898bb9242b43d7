//! Wiring of the in-memory adapters into the domain services.

use std::sync::Arc;

use mockable::Clock;

use super::{
    InMemoryCheckpointRepository, InMemoryContributionRepository, InMemoryPrescriptionRepository,
    InMemoryRoleStore, InMemorySharingGrantRepository, InMemorySyncQueue,
    InMemoryVerificationSnapshotRepository,
};
use crate::domain::{
    ContributionService, ProfileResolver, SharingService, SharingServicePorts, VerificationService,
    VerificationServicePorts,
};

/// One instance of every in-memory store.
///
/// Sharing and drift keep separate cursors in the shared checkpoint store,
/// keyed by job.
#[derive(Debug, Default, Clone)]
pub struct MemoryStores {
    /// Role tables; also serves as the pharmacist roster.
    pub roles: Arc<InMemoryRoleStore>,
    /// Prescriptions.
    pub prescriptions: Arc<InMemoryPrescriptionRepository>,
    /// Sharing grants.
    pub grants: Arc<InMemorySharingGrantRepository>,
    /// Authoritative contribution records and their version watermark.
    pub contributions: Arc<InMemoryContributionRepository>,
    /// Agent-facing snapshot cache.
    pub snapshots: Arc<InMemoryVerificationSnapshotRepository>,
    /// Members awaiting resync.
    pub sync_queue: Arc<InMemorySyncQueue>,
    /// Reconciliation cursors.
    pub checkpoints: Arc<InMemoryCheckpointRepository>,
}

impl MemoryStores {
    /// Empty stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over the role tables.
    pub fn profile_resolver(&self) -> ProfileResolver<InMemoryRoleStore> {
        ProfileResolver::new(Arc::clone(&self.roles))
    }

    /// Sharing propagator over these stores.
    pub fn sharing_service(&self, clock: Arc<dyn Clock>) -> SharingService {
        SharingService::new(
            SharingServicePorts {
                prescriptions: self.prescriptions.clone(),
                grants: self.grants.clone(),
                roster: self.roles.clone(),
                checkpoints: self.checkpoints.clone(),
            },
            clock,
        )
    }

    /// Insurer-side contribution service over these stores.
    pub fn contribution_service(&self, clock: Arc<dyn Clock>, grace_days: u32) -> ContributionService {
        ContributionService::new(self.contributions.clone(), clock, grace_days)
    }

    /// Verification synchronizer over these stores.
    pub fn verification_service(&self, clock: Arc<dyn Clock>) -> VerificationService {
        VerificationService::new(
            VerificationServicePorts {
                records: self.contributions.clone(),
                versions: self.contributions.clone(),
                snapshots: self.snapshots.clone(),
                queue: self.sync_queue.clone(),
                checkpoints: self.checkpoints.clone(),
            },
            clock,
        )
    }
}
