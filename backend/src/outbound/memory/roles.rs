//! Role tables backing both the role directory and the pharmacist roster.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Guarded;
use crate::domain::ports::{PharmacistRoster, PharmacistRosterError, RoleDirectory, RoleStoreError};
use crate::domain::{
    AccountId, AgentProfile, DoctorProfile, InsurerProfile, MemberProfile, PharmacistId,
    PharmacistProfile, RoleKind, RoleProfile,
};

/// Five independent role tables keyed by owning account.
///
/// Nothing stops two tables from claiming the same account; that anomaly is
/// what the profile resolver reports.
#[derive(Debug)]
pub struct InMemoryRoleStore {
    members: Guarded<HashMap<AccountId, MemberProfile>>,
    doctors: Guarded<HashMap<AccountId, DoctorProfile>>,
    pharmacists: Guarded<HashMap<AccountId, PharmacistProfile>>,
    insurers: Guarded<HashMap<AccountId, InsurerProfile>>,
    agents: Guarded<HashMap<AccountId, AgentProfile>>,
}

impl Default for InMemoryRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoleStore {
    /// Empty role tables.
    pub fn new() -> Self {
        Self {
            members: Guarded::new(RoleKind::Member.store_name(), HashMap::new()),
            doctors: Guarded::new(RoleKind::Doctor.store_name(), HashMap::new()),
            pharmacists: Guarded::new(RoleKind::Pharmacist.store_name(), HashMap::new()),
            insurers: Guarded::new(RoleKind::Insurer.store_name(), HashMap::new()),
            agents: Guarded::new(RoleKind::Agent.store_name(), HashMap::new()),
        }
    }

    /// Store `profile` in the table of its role, replacing any profile the
    /// account already had there.
    pub fn add(&self, profile: RoleProfile) -> Result<(), RoleStoreError> {
        match profile {
            RoleProfile::Member(member) => {
                self.members.lock::<RoleStoreError>()?.insert(member.account_id, member);
            }
            RoleProfile::Doctor(doctor) => {
                self.doctors.lock::<RoleStoreError>()?.insert(doctor.account_id, doctor);
            }
            RoleProfile::Pharmacist(pharmacist) => {
                self.pharmacists
                    .lock::<RoleStoreError>()?
                    .insert(pharmacist.account_id, pharmacist);
            }
            RoleProfile::Insurer(insurer) => {
                self.insurers.lock::<RoleStoreError>()?.insert(insurer.account_id, insurer);
            }
            RoleProfile::Agent(agent) => {
                self.agents.lock::<RoleStoreError>()?.insert(agent.account_id, agent);
            }
        }
        Ok(())
    }

    /// Flip a pharmacist's active flag. Returns `false` for an unknown id.
    pub fn set_pharmacist_active(
        &self,
        pharmacist_id: PharmacistId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, RoleStoreError> {
        let mut pharmacists = self.pharmacists.lock::<RoleStoreError>()?;
        let Some(pharmacist) = pharmacists
            .values_mut()
            .find(|pharmacist| pharmacist.id == pharmacist_id)
        else {
            return Ok(false);
        };
        pharmacist.active = active;
        if active {
            pharmacist.activated_at = Some(at);
        }
        Ok(true)
    }

    /// Take one role table offline, or bring it back.
    pub fn set_offline(&self, kind: RoleKind, offline: bool) {
        match kind {
            RoleKind::Member => self.members.set_offline(offline),
            RoleKind::Doctor => self.doctors.set_offline(offline),
            RoleKind::Pharmacist => self.pharmacists.set_offline(offline),
            RoleKind::Insurer => self.insurers.set_offline(offline),
            RoleKind::Agent => self.agents.set_offline(offline),
        }
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleStore {
    async fn find_member(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<MemberProfile>, RoleStoreError> {
        Ok(self.members.lock::<RoleStoreError>()?.get(account_id).cloned())
    }

    async fn find_doctor(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<DoctorProfile>, RoleStoreError> {
        Ok(self.doctors.lock::<RoleStoreError>()?.get(account_id).cloned())
    }

    async fn find_pharmacist(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<PharmacistProfile>, RoleStoreError> {
        Ok(self
            .pharmacists
            .lock::<RoleStoreError>()?
            .get(account_id)
            .cloned())
    }

    async fn find_insurer(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<InsurerProfile>, RoleStoreError> {
        Ok(self.insurers.lock::<RoleStoreError>()?.get(account_id).cloned())
    }

    async fn find_agent(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AgentProfile>, RoleStoreError> {
        Ok(self.agents.lock::<RoleStoreError>()?.get(account_id).cloned())
    }
}

#[async_trait]
impl PharmacistRoster for InMemoryRoleStore {
    async fn list_active(&self) -> Result<Vec<PharmacistProfile>, PharmacistRosterError> {
        let pharmacists = self.pharmacists.lock::<PharmacistRosterError>()?;
        let mut active: Vec<_> = pharmacists
            .values()
            .filter(|pharmacist| pharmacist.active)
            .cloned()
            .collect();
        active.sort_by_key(|pharmacist| pharmacist.id);
        Ok(active)
    }

    async fn find(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Option<PharmacistProfile>, PharmacistRosterError> {
        Ok(self
            .pharmacists
            .lock::<PharmacistRosterError>()?
            .values()
            .find(|pharmacist| pharmacist.id == *pharmacist_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::DoctorId;

    fn pharmacist(active: bool) -> PharmacistProfile {
        PharmacistProfile {
            id: PharmacistId::random(),
            account_id: AccountId::random(),
            active,
            activated_at: None,
        }
    }

    #[fixture]
    fn store() -> InMemoryRoleStore {
        InMemoryRoleStore::new()
    }

    #[rstest]
    #[tokio::test]
    async fn profiles_are_found_by_account(store: InMemoryRoleStore) {
        let account = AccountId::random();
        let doctor = DoctorProfile {
            id: DoctorId::random(),
            account_id: account,
        };
        store
            .add(RoleProfile::Doctor(doctor.clone()))
            .expect("add doctor");

        assert_eq!(store.find_doctor(&account).await, Ok(Some(doctor)));
        assert_eq!(store.find_member(&account).await, Ok(None));
    }

    #[rstest]
    #[tokio::test]
    async fn roster_lists_only_active_pharmacists(store: InMemoryRoleStore) {
        let dormant = pharmacist(false);
        let active = pharmacist(true);
        store
            .add(RoleProfile::Pharmacist(dormant.clone()))
            .expect("add dormant");
        store
            .add(RoleProfile::Pharmacist(active.clone()))
            .expect("add active");

        assert_eq!(store.list_active().await, Ok(vec![active]));

        let now = Utc::now();
        assert_eq!(store.set_pharmacist_active(dormant.id, true, now), Ok(true));
        let listed = store.list_active().await.expect("roster readable");
        assert_eq!(listed.len(), 2);
        let found = PharmacistRoster::find(&store, &dormant.id)
            .await
            .expect("roster readable")
            .expect("pharmacist present");
        assert_eq!(found.activated_at, Some(now));
    }

    #[rstest]
    #[tokio::test]
    async fn offline_table_fails_only_its_own_lookups(store: InMemoryRoleStore) {
        let account = AccountId::random();
        store.set_offline(RoleKind::Insurer, true);

        let err = store.find_insurer(&account).await.expect_err("offline");
        assert_eq!(err, RoleStoreError::connection("insurer store is offline"));
        assert_eq!(store.find_agent(&account).await, Ok(None));
    }
}
