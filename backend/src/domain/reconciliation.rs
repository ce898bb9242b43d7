//! Shared vocabulary of the batch repair jobs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::domain::ports::CheckpointRepositoryError;

pub(crate) fn map_checkpoint_error(error: CheckpointRepositoryError) -> DomainError {
    match error {
        CheckpointRepositoryError::Connection { .. } => DomainError::store_unavailable("checkpoint"),
        CheckpointRepositoryError::Query { message } => {
            DomainError::internal(format!("checkpoint repository error: {message}"))
        }
    }
}

/// Outcome of one batch repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    /// Items examined.
    pub scanned: u64,
    /// Items repaired (or enqueued for repair).
    pub fixed: u64,
    /// Items whose repair failed; processing continued past them.
    pub errors: u64,
    /// Whether the run stopped early on cancellation.
    #[serde(default)]
    pub cancelled: bool,
}

impl ReconciliationSummary {
    /// Whether the run found nothing to repair and hit no errors.
    pub const fn is_clean(&self) -> bool {
        self.fixed == 0 && self.errors == 0
    }
}

/// Resumable batch jobs with a persisted cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationJob {
    /// Grant backfill and revocation mirroring.
    Sharing,
    /// Snapshot drift detection.
    Drift,
}

impl ReconciliationJob {
    /// Stable job name used for checkpoints and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sharing => "sharing",
            Self::Drift => "drift",
        }
    }
}

impl fmt::Display for ReconciliationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cooperative cancellation signal, checked between batches.
///
/// Clones share the same flag.
///
/// # Examples
/// ```
/// use mutuelle_sync::domain::CancellationFlag;
///
/// let flag = CancellationFlag::new();
/// let handle = flag.clone();
/// handle.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
