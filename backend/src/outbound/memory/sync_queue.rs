//! FIFO resync queue with set semantics.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;

use super::Guarded;
use crate::domain::MemberId;
use crate::domain::ports::{SyncQueue, SyncQueueError};

#[derive(Debug, Default)]
struct Pending {
    order: VecDeque<MemberId>,
    queued: HashSet<MemberId>,
}

/// In-memory [`SyncQueue`]; a member is queued at most once.
#[derive(Debug)]
pub struct InMemorySyncQueue {
    pending: Guarded<Pending>,
}

impl Default for InMemorySyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySyncQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            pending: Guarded::new("sync queue", Pending::default()),
        }
    }

    /// Simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.pending.set_offline(offline);
    }
}

#[async_trait]
impl SyncQueue for InMemorySyncQueue {
    async fn enqueue(&self, member_id: &MemberId) -> Result<bool, SyncQueueError> {
        let mut pending = self.pending.lock::<SyncQueueError>()?;
        if !pending.queued.insert(*member_id) {
            return Ok(false);
        }
        pending.order.push_back(*member_id);
        Ok(true)
    }

    async fn dequeue_batch(&self, limit: usize) -> Result<Vec<MemberId>, SyncQueueError> {
        let mut pending = self.pending.lock::<SyncQueueError>()?;
        let take = limit.min(pending.order.len());
        let batch: Vec<_> = pending.order.drain(..take).collect();
        for member_id in &batch {
            pending.queued.remove(member_id);
        }
        Ok(batch)
    }

    async fn len(&self) -> Result<usize, SyncQueueError> {
        Ok(self.pending.lock::<SyncQueueError>()?.order.len())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn duplicates_are_ignored_until_dequeued() {
        let queue = InMemorySyncQueue::new();
        let first = MemberId::random();
        let second = MemberId::random();

        assert_eq!(queue.enqueue(&first).await, Ok(true));
        assert_eq!(queue.enqueue(&second).await, Ok(true));
        assert_eq!(queue.enqueue(&first).await, Ok(false));
        assert_eq!(queue.len().await, Ok(2));

        assert_eq!(queue.dequeue_batch(1).await, Ok(vec![first]));
        assert_eq!(queue.enqueue(&first).await, Ok(true));
        assert_eq!(queue.dequeue_batch(10).await, Ok(vec![second, first]));
        assert_eq!(queue.len().await, Ok(0));
    }

    #[rstest]
    #[tokio::test]
    async fn offline_queue_is_unavailable() {
        let queue = InMemorySyncQueue::new();
        queue.set_offline(true);
        let err = queue.dequeue_batch(5).await.expect_err("offline");
        assert!(matches!(err, SyncQueueError::Unavailable { .. }));
    }
}
