//! Port for the queue of members awaiting a snapshot resync.

use async_trait::async_trait;

use crate::domain::MemberId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by sync queue adapters.
    pub enum SyncQueueError {
        /// Queue backend could not be reached.
        Unavailable { message: String } =>
            "sync queue unavailable: {message}",
        /// Queue backend rejected the operation.
        Rejected { message: String } =>
            "sync queue rejected operation: {message}",
    }
}

/// Set-like FIFO of members to resync.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// Queue `member_id`; returns `false` when it was already queued.
    async fn enqueue(&self, member_id: &MemberId) -> Result<bool, SyncQueueError>;

    /// Remove and return up to `limit` members in enqueue order.
    async fn dequeue_batch(&self, limit: usize) -> Result<Vec<MemberId>, SyncQueueError>;

    /// Members currently queued.
    async fn len(&self) -> Result<usize, SyncQueueError>;
}

/// Fixture implementation that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSyncQueue;

#[async_trait]
impl SyncQueue for FixtureSyncQueue {
    async fn enqueue(&self, _member_id: &MemberId) -> Result<bool, SyncQueueError> {
        Ok(true)
    }

    async fn dequeue_batch(&self, _limit: usize) -> Result<Vec<MemberId>, SyncQueueError> {
        Ok(Vec::new())
    }

    async fn len(&self) -> Result<usize, SyncQueueError> {
        Ok(0)
    }
}
