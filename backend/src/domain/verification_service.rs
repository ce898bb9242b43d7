//! Agent-facing verification cache over the contribution records.
//!
//! Reads are always served from the cache so field agents keep working
//! while the authoritative store is out of reach. Freshness is decided by
//! comparing the snapshot's `source_version` with a cheap version watermark;
//! when the watermark cannot be read the snapshot is reported stale.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::contribution_service::map_contribution_error;
use crate::domain::ports::{
    CheckpointRepository, ContributionRepository, ContributionVersionSource, SyncQueue,
    SyncQueueError, VerificationSnapshotRepository, VerificationSnapshotRepositoryError,
};
use crate::domain::reconciliation::map_checkpoint_error;
use crate::domain::{
    CancellationFlag, DomainError, ErrorCode, Freshness, MemberId, ReconciliationJob,
    ReconciliationSummary, SnapshotView, VerificationSnapshot,
};

/// Default number of records examined per drift-detection batch.
pub const DEFAULT_DRIFT_BATCH_SIZE: usize = 100;

fn map_snapshot_error(error: VerificationSnapshotRepositoryError) -> DomainError {
    match error {
        VerificationSnapshotRepositoryError::Connection { .. } => {
            DomainError::store_unavailable("verification snapshot")
        }
        VerificationSnapshotRepositoryError::Query { message } => {
            DomainError::internal(format!("verification snapshot repository error: {message}"))
        }
        err @ VerificationSnapshotRepositoryError::VersionRegressed { .. } => {
            DomainError::conflict(err.to_string())
        }
    }
}

fn map_queue_error(error: SyncQueueError) -> DomainError {
    match error {
        SyncQueueError::Unavailable { .. } => DomainError::store_unavailable("sync queue"),
        SyncQueueError::Rejected { message } => {
            DomainError::internal(format!("sync queue rejected operation: {message}"))
        }
    }
}

/// Ports required by [`VerificationService`].
pub struct VerificationServicePorts {
    /// Authoritative contribution records.
    pub records: Arc<dyn ContributionRepository>,
    /// Version watermark of the records.
    pub versions: Arc<dyn ContributionVersionSource>,
    /// Snapshot cache.
    pub snapshots: Arc<dyn VerificationSnapshotRepository>,
    /// Members awaiting resync.
    pub queue: Arc<dyn SyncQueue>,
    /// Drift-detection progress.
    pub checkpoints: Arc<dyn CheckpointRepository>,
}

/// Verification synchronizer.
pub struct VerificationService {
    records: Arc<dyn ContributionRepository>,
    versions: Arc<dyn ContributionVersionSource>,
    snapshots: Arc<dyn VerificationSnapshotRepository>,
    queue: Arc<dyn SyncQueue>,
    checkpoints: Arc<dyn CheckpointRepository>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl VerificationService {
    /// Build the service over its ports.
    pub fn new(ports: VerificationServicePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: ports.records,
            versions: ports.versions,
            snapshots: ports.snapshots,
            queue: ports.queue,
            checkpoints: ports.checkpoints,
            clock,
            batch_size: DEFAULT_DRIFT_BATCH_SIZE,
        }
    }

    /// Override the drift-detection batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Recompute and store the member's snapshot from its current record.
    ///
    /// Fails with `Conflict` when a snapshot of a newer version is already
    /// stored; the stored snapshot is left untouched.
    pub async fn sync_snapshot(&self, member_id: MemberId) -> Result<VerificationSnapshot, DomainError> {
        let record = self
            .records
            .find_by_member(&member_id)
            .await
            .map_err(map_contribution_error)?;
        let snapshot = VerificationSnapshot::derive(member_id, record.as_ref(), self.clock.utc());

        self.snapshots
            .upsert_if_not_older(&snapshot)
            .await
            .map_err(|error| {
                if matches!(error, VerificationSnapshotRepositoryError::VersionRegressed { .. }) {
                    warn!(member = %member_id, error = %error, "rejected regressing snapshot write");
                }
                map_snapshot_error(error)
            })?;
        debug!(
            member = %member_id,
            source_version = snapshot.source_version,
            status = ?snapshot.status,
            "snapshot synced"
        );
        Ok(snapshot)
    }

    /// Cached snapshot with its freshness; never reads the record itself.
    pub async fn get_snapshot(&self, member_id: MemberId) -> Result<SnapshotView, DomainError> {
        let snapshot = self
            .snapshots
            .find(&member_id)
            .await
            .map_err(map_snapshot_error)?
            .ok_or_else(|| DomainError::not_found("verification snapshot", member_id))?;

        let freshness = match self.versions.current_version(&member_id).await {
            Ok(current) => snapshot.freshness_against(current),
            Err(error) => {
                warn!(
                    member = %member_id,
                    error = %error,
                    "version watermark unreadable; serving snapshot as stale"
                );
                Freshness::Stale
            }
        };
        Ok(SnapshotView {
            snapshot,
            freshness,
        })
    }

    /// Queue every member whose snapshot lags its record's version.
    ///
    /// `fixed` counts drifted members found (the queue ignores duplicates).
    /// A snapshot ahead of its record is an integrity violation, logged and
    /// counted in `errors`.
    pub async fn detect_drift(
        &self,
        cancel: &CancellationFlag,
    ) -> Result<ReconciliationSummary, DomainError> {
        let job = ReconciliationJob::Drift;
        let mut cursor = self.load_cursor().await?;
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
                match self.check_drift(entry.member_id, entry.version).await {
                    Ok(true) => summary.fixed += 1,
                    Ok(false) => {}
                    Err(error) => {
                        summary.errors += 1;
                        warn!(
                            member = %entry.member_id,
                            error = %error,
                            "drift check failed; continuing"
                        );
                    }
                }
            }

            cursor = Some(last);
            self.checkpoints
                .save(job, &last.to_string())
                .await
                .map_err(map_checkpoint_error)?;
            if batch.len() < self.batch_size {
                break;
            }
        }

        if !summary.cancelled {
            self.checkpoints
                .clear(job)
                .await
                .map_err(map_checkpoint_error)?;
        }
        info!(
            job = %job,
            scanned = summary.scanned,
            fixed = summary.fixed,
            errors = summary.errors,
            cancelled = summary.cancelled,
            "drift detection finished"
        );
        Ok(summary)
    }

    /// Resync up to `limit` queued members.
    ///
    /// A member whose sync fails is queued again. A sync rejected because a
    /// newer snapshot is already stored needs no retry.
    pub async fn process_sync_queue(&self, limit: usize) -> Result<ReconciliationSummary, DomainError> {
        let members = self
            .queue
            .dequeue_batch(limit)
            .await
            .map_err(map_queue_error)?;

        let mut summary = ReconciliationSummary::default();
        for member_id in members {
            summary.scanned += 1;
            match self.sync_snapshot(member_id).await {
                Ok(_) => summary.fixed += 1,
                Err(error) if error.code() == ErrorCode::Conflict => {
                    debug!(member = %member_id, "newer snapshot already stored");
                }
                Err(error) => {
                    summary.errors += 1;
                    warn!(member = %member_id, error = %error, "snapshot sync failed; requeueing");
                    if let Err(requeue) = self.queue.enqueue(&member_id).await {
                        warn!(member = %member_id, error = %requeue, "requeue failed");
                    }
                }
            }
        }
        info!(
            scanned = summary.scanned,
            fixed = summary.fixed,
            errors = summary.errors,
            "sync queue processed"
        );
        Ok(summary)
    }

    async fn check_drift(&self, member_id: MemberId, version: u64) -> Result<bool, DomainError> {
        let stored_version = self
            .snapshots
            .find(&member_id)
            .await
            .map_err(map_snapshot_error)?
            .map_or(0, |snapshot| snapshot.source_version);

        if stored_version > version {
            return Err(DomainError::integrity_violation(format!(
                "snapshot of member {member_id} reflects version {stored_version} \
                 but the record is at version {version}"
            )));
        }
        if stored_version == version {
            return Ok(false);
        }

        let newly_queued = self
            .queue
            .enqueue(&member_id)
            .await
            .map_err(map_queue_error)?;
        debug!(
            member = %member_id,
            stored_version,
            version,
            newly_queued,
            "drift detected"
        );
        Ok(true)
    }

    async fn load_cursor(&self) -> Result<Option<MemberId>, DomainError> {
        let saved = self
            .checkpoints
            .load(ReconciliationJob::Drift)
            .await
            .map_err(map_checkpoint_error)?;
        Ok(saved.and_then(|raw| match MemberId::new(&raw) {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(cursor = %raw, error = %error, "discarding unreadable drift checkpoint");
                None
            }
        }))
    }
}

#[cfg(test)]
#[path = "verification_service_tests.rs"]
mod tests;
