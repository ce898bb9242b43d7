//! In-memory adapters for every domain port.
//!
//! Each adapter keeps its rows behind a `Mutex` and enforces the store-level
//! guarantees itself: unique grant pairs, compare-and-set on contribution
//! versions and the snapshot version guard. Every adapter can be switched
//! offline, after which it answers with its port's connection error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::ports::{
    CheckpointRepositoryError, ContributionRepositoryError, PharmacistRosterError,
    PrescriptionRepositoryError, RoleStoreError, SharingGrantRepositoryError, SyncQueueError,
    VerificationSnapshotRepositoryError,
};

mod checkpoints;
mod contributions;
mod grants;
mod prescriptions;
mod roles;
pub mod seed;
mod snapshots;
mod stores;
mod sync_queue;

pub use checkpoints::InMemoryCheckpointRepository;
pub use contributions::InMemoryContributionRepository;
pub use grants::InMemorySharingGrantRepository;
pub use prescriptions::InMemoryPrescriptionRepository;
pub use roles::InMemoryRoleStore;
pub use seed::{SeedDocument, SeedError};
pub use snapshots::InMemoryVerificationSnapshotRepository;
pub use stores::MemoryStores;
pub use sync_queue::InMemorySyncQueue;

/// Failures every in-memory adapter can produce.
pub(crate) trait AdapterError {
    /// The adapter was switched offline.
    fn offline(store: &str) -> Self;
    /// A previous holder of the lock panicked.
    fn poisoned(store: &str) -> Self;
}

macro_rules! adapter_error {
    ($error:ty, $offline:ident, $poisoned:ident) => {
        impl AdapterError for $error {
            fn offline(store: &str) -> Self {
                Self::$offline(format!("{store} store is offline"))
            }

            fn poisoned(store: &str) -> Self {
                Self::$poisoned(format!("{store} store lock poisoned"))
            }
        }
    };
}

adapter_error!(RoleStoreError, connection, query);
adapter_error!(PharmacistRosterError, connection, query);
adapter_error!(PrescriptionRepositoryError, connection, query);
adapter_error!(SharingGrantRepositoryError, connection, query);
adapter_error!(ContributionRepositoryError, connection, query);
adapter_error!(VerificationSnapshotRepositoryError, connection, query);
adapter_error!(SyncQueueError, unavailable, rejected);
adapter_error!(CheckpointRepositoryError, connection, query);

/// Rows of one store plus its availability switch.
#[derive(Debug)]
pub(crate) struct Guarded<T> {
    store: &'static str,
    rows: Mutex<T>,
    offline: AtomicBool,
}

impl<T> Guarded<T> {
    pub(crate) fn new(store: &'static str, rows: T) -> Self {
        Self {
            store,
            rows: Mutex::new(rows),
            offline: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Lock the rows, failing when offline or poisoned.
    pub(crate) fn lock<E: AdapterError>(&self) -> Result<MutexGuard<'_, T>, E> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(E::offline(self.store));
        }
        self.rows.lock().map_err(|_| E::poisoned(self.store))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn offline_store_answers_with_connection_error() {
        let guarded = Guarded::new("checkpoint", 0_u8);
        guarded.set_offline(true);
        let err = guarded
            .lock::<CheckpointRepositoryError>()
            .expect_err("offline");
        assert!(matches!(err, CheckpointRepositoryError::Connection { .. }));

        guarded.set_offline(false);
        assert!(guarded.lock::<CheckpointRepositoryError>().is_ok());
    }

    #[rstest]
    fn poisoned_lock_maps_to_the_poisoned_variant() {
        let guarded = std::sync::Arc::new(Guarded::new("sync queue", 0_u8));
        let clone = std::sync::Arc::clone(&guarded);
        let joined = std::thread::spawn(move || {
            let _rows = clone.lock::<SyncQueueError>().expect("first lock");
            panic!("poison the lock");
        })
        .join();
        assert!(joined.is_err());

        let err = guarded.lock::<SyncQueueError>().expect_err("poisoned");
        assert_eq!(err, SyncQueueError::rejected("sync queue store lock poisoned"));
    }
}
