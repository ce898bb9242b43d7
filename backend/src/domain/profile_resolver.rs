//! Account → role profile resolution.
//!
//! The resolver asks every role store independently whether it holds a
//! profile for the account, waits for all five answers, and only then
//! decides. It never returns a default role: an account no store claims is
//! [`RoleResolution::Unresolved`], and an unreachable store is an error the
//! caller must retry.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::ports::{RoleDirectory, RoleStoreError};
use crate::domain::{AccountId, DomainError, RetryPolicy, RetryRuntime, RoleKind, RoleProfile};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoleResolution {
    /// Exactly one profile is served.
    Resolved {
        /// Winning profile under [`RoleKind::PRIORITY`].
        profile: RoleProfile,
        /// Integrity violation when several stores claimed the account.
        #[serde(skip_serializing_if = "Option::is_none")]
        violation: Option<DomainError>,
    },
    /// No store holds a profile for the account; it needs onboarding.
    Unresolved,
}

impl RoleResolution {
    /// Served profile, if any.
    pub const fn profile(&self) -> Option<&RoleProfile> {
        match self {
            Self::Resolved { profile, .. } => Some(profile),
            Self::Unresolved => None,
        }
    }
}

fn map_store_error(kind: RoleKind, error: &RoleStoreError) -> DomainError {
    match error {
        RoleStoreError::Connection { .. } => DomainError::store_unavailable(kind.store_name()),
        RoleStoreError::Query { message } => DomainError::internal(format!(
            "{} store lookup failed: {message}",
            kind.store_name()
        )),
    }
}

type Answer = Result<Option<RoleProfile>, RoleStoreError>;

/// Role resolver over a [`RoleDirectory`].
#[derive(Clone)]
pub struct ProfileResolver<D> {
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    runtime: RetryRuntime,
    policy: RetryPolicy,
}

impl<D> ProfileResolver<D> {
    /// Build a resolver with the default retry policy and runtime.
    pub fn new(directory: Arc<D>) -> Self {
        Self::with_retry(
            directory,
            Arc::new(DefaultClock),
            RetryRuntime::default(),
            RetryPolicy::default(),
        )
    }

    /// Build a resolver with injected retry behaviour.
    pub fn with_retry(
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        runtime: RetryRuntime,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            directory,
            clock,
            runtime,
            policy,
        }
    }
}

impl<D> ProfileResolver<D>
where
    D: RoleDirectory,
{
    /// Resolve `account_id` to at most one role profile.
    ///
    /// Fails with `StoreUnavailable` naming the highest-priority unreachable
    /// store whenever any store could not answer, whatever the others said.
    pub async fn resolve_role(&self, account_id: &AccountId) -> Result<RoleResolution, DomainError> {
        let (insurer, doctor, pharmacist, agent, member) = tokio::join!(
            self.directory.find_insurer(account_id),
            self.directory.find_doctor(account_id),
            self.directory.find_pharmacist(account_id),
            self.directory.find_agent(account_id),
            self.directory.find_member(account_id),
        );

        let answers: [(RoleKind, Answer); 5] = [
            (RoleKind::Insurer, insurer.map(|p| p.map(RoleProfile::Insurer))),
            (RoleKind::Doctor, doctor.map(|p| p.map(RoleProfile::Doctor))),
            (
                RoleKind::Pharmacist,
                pharmacist.map(|p| p.map(RoleProfile::Pharmacist)),
            ),
            (RoleKind::Agent, agent.map(|p| p.map(RoleProfile::Agent))),
            (RoleKind::Member, member.map(|p| p.map(RoleProfile::Member))),
        ];

        if let Some((kind, Err(error))) = answers
            .iter()
            .find(|(_, answer)| matches!(answer, Err(RoleStoreError::Connection { .. })))
        {
            return Err(map_store_error(*kind, error));
        }
        if let Some((kind, Err(error))) = answers.iter().find(|(_, answer)| answer.is_err()) {
            return Err(map_store_error(*kind, error));
        }

        let matches: Vec<RoleProfile> = answers
            .into_iter()
            .filter_map(|(_, answer)| answer.ok().flatten())
            .collect();

        let Some(profile) = matches.first().cloned() else {
            debug!(account = %account_id, "account resolves to no role");
            return Ok(RoleResolution::Unresolved);
        };

        let violation = (matches.len() > 1).then(|| {
            let stores: Vec<&'static str> = matches
                .iter()
                .map(|claimed| claimed.kind().store_name())
                .collect();
            warn!(
                account = %account_id,
                stores = ?stores,
                resolved = profile.kind().store_name(),
                "account claimed by several role stores; serving highest priority"
            );
            DomainError::integrity_violation(format!(
                "account {account_id} is claimed by the {} stores",
                stores.join(", ")
            ))
            .with_details(json!({
                "account": account_id.to_string(),
                "stores": stores,
                "resolved": profile.kind().store_name(),
            }))
        });

        Ok(RoleResolution::Resolved { profile, violation })
    }

    /// [`Self::resolve_role`] with jittered exponential backoff on
    /// `StoreUnavailable`.
    ///
    /// Other errors are returned at once. When attempts run out the last
    /// `StoreUnavailable` is returned.
    pub async fn resolve_role_with_retry(
        &self,
        account_id: &AccountId,
    ) -> Result<RoleResolution, DomainError> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match self.resolve_role(account_id).await {
                Err(error) if error.code().is_retryable() && attempt < attempts => {
                    let base_delay = self.policy.base_delay(attempt);
                    let delay =
                        self.runtime
                            .jitter
                            .jittered_delay(base_delay, attempt, self.clock.utc());
                    warn!(
                        account = %account_id,
                        attempt,
                        store = error.unavailable_store().unwrap_or("unknown"),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "role store unavailable; retrying"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

#[cfg(test)]
#[path = "profile_resolver_tests.rs"]
mod tests;
