//! Role resolution and cross-role record synchronisation.
//!
//! The crate resolves accounts to role profiles, propagates doctor-authored
//! prescriptions to pharmacists through explicit grants, and keeps the
//! agent-facing contribution snapshots in step with the insurer's records.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::ReconciliationSettings;
