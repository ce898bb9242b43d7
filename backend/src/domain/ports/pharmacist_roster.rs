//! Port listing pharmacist profiles for grant fan-out.

use async_trait::async_trait;

use crate::domain::{PharmacistId, PharmacistProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by pharmacist roster adapters.
    pub enum PharmacistRosterError {
        /// Roster store could not be reached.
        Connection { message: String } =>
            "pharmacist roster connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "pharmacist roster query failed: {message}",
    }
}

/// Read access to pharmacist profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PharmacistRoster: Send + Sync {
    /// Pharmacists currently flagged active.
    async fn list_active(&self) -> Result<Vec<PharmacistProfile>, PharmacistRosterError>;

    /// Look up a pharmacist by profile id.
    async fn find(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Option<PharmacistProfile>, PharmacistRosterError>;
}

/// Fixture implementation with an empty roster.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePharmacistRoster;

#[async_trait]
impl PharmacistRoster for FixturePharmacistRoster {
    async fn list_active(&self) -> Result<Vec<PharmacistProfile>, PharmacistRosterError> {
        Ok(Vec::new())
    }

    async fn find(
        &self,
        _pharmacist_id: &PharmacistId,
    ) -> Result<Option<PharmacistProfile>, PharmacistRosterError> {
        Ok(None)
    }
}
