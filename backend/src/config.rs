//! Reconciliation configuration loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{RetryPolicy, SchedulerConfig};

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 200;
const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 5_000;

/// Cadence, batching and retry settings for the reconciliation jobs.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MUTUELLE_RECONCILE")]
pub struct ReconciliationSettings {
    /// Seconds to wait between scheduler cycles.
    pub interval_secs: Option<u64>,
    /// Keyset batch size for sharing reconciliation and drift detection.
    pub batch_size: Option<usize>,
    /// Stop after this many cycles; unbounded when absent.
    pub max_cycles: Option<u64>,
    /// Attempts made by retrying role resolution.
    pub retry_max_attempts: Option<u32>,
    /// First backoff delay in milliseconds.
    pub retry_initial_backoff_ms: Option<u64>,
    /// Backoff ceiling in milliseconds.
    pub retry_max_backoff_ms: Option<u64>,
    /// Days added to a period's end to obtain its due date.
    pub contribution_grace_days: Option<u32>,
}

impl ReconciliationSettings {
    /// Pause between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS))
    }

    /// Batch size, never below one.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1)
    }

    /// Grace period applied to contribution due dates.
    pub fn contribution_grace_days(&self) -> u32 {
        self.contribution_grace_days.unwrap_or_default()
    }

    /// Scheduler cadence derived from these settings.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval(),
            max_cycles: self.max_cycles,
            resync_batch: self.batch_size(),
        }
    }

    /// Retry policy for role resolution.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self
                .retry_max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            initial_backoff: Duration::from_millis(
                self.retry_initial_backoff_ms
                    .unwrap_or(DEFAULT_RETRY_INITIAL_BACKOFF_MS),
            ),
            max_backoff: Duration::from_millis(
                self.retry_max_backoff_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_BACKOFF_MS),
            ),
        }
    }
}
