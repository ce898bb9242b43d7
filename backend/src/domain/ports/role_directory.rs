//! Port exposing one existence check per role store.
//!
//! Each check is keyed by the account and queried independently; callers
//! never follow a cached back-reference from the account to its profile.

use async_trait::async_trait;

use crate::domain::{
    AccountId, AgentProfile, DoctorProfile, InsurerProfile, MemberProfile, PharmacistProfile,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by role store adapters.
    pub enum RoleStoreError {
        /// The role store could not be reached.
        Connection { message: String } =>
            "role store connection failed: {message}",
        /// The lookup failed during execution.
        Query { message: String } =>
            "role store query failed: {message}",
    }
}

/// Capability checks against the five role stores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Member profile owned by `account_id`.
    async fn find_member(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<MemberProfile>, RoleStoreError>;

    /// Doctor profile owned by `account_id`.
    async fn find_doctor(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<DoctorProfile>, RoleStoreError>;

    /// Pharmacist profile owned by `account_id`.
    async fn find_pharmacist(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<PharmacistProfile>, RoleStoreError>;

    /// Insurer profile owned by `account_id`.
    async fn find_insurer(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<InsurerProfile>, RoleStoreError>;

    /// Agent profile owned by `account_id`.
    async fn find_agent(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AgentProfile>, RoleStoreError>;
}

/// Fixture implementation in which no account owns any role.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureRoleDirectory;

#[async_trait]
impl RoleDirectory for FixtureRoleDirectory {
    async fn find_member(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<MemberProfile>, RoleStoreError> {
        Ok(None)
    }

    async fn find_doctor(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<DoctorProfile>, RoleStoreError> {
        Ok(None)
    }

    async fn find_pharmacist(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<PharmacistProfile>, RoleStoreError> {
        Ok(None)
    }

    async fn find_insurer(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<InsurerProfile>, RoleStoreError> {
        Ok(None)
    }

    async fn find_agent(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<AgentProfile>, RoleStoreError> {
        Ok(None)
    }
}
